// Mining cycle: pool snapshot, reward, proof of work, append, gossip

use crate::config::ChainConfig;
use crate::core::{Block, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::Node;
use crate::wallet::Wallet;
use std::time::Duration;

/// Mines pending transactions into blocks on behalf of one node
pub struct Miner {
    node: Node,
    /// Receives the mining reward
    wallet: Wallet,
    /// Signs reward transactions
    system_wallet: Wallet,
}

/// Everything the nonce search needs, taken under one read lock
struct Candidate {
    previous: Block,
    transactions: Vec<Transaction>,
    config: ChainConfig,
}

impl Miner {
    pub fn new(node: Node, wallet: Wallet, system_wallet: Wallet) -> Self {
        Self {
            node,
            wallet,
            system_wallet,
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Run one mining cycle.
    ///
    /// The nonce search runs on a blocking thread so the node keeps handling
    /// gossip. If the tip moved while mining, the block is dropped and `None`
    /// is returned with nothing changed.
    pub async fn mine(&self) -> Result<Option<Block>> {
        let candidate = self.snapshot().await?;
        let block = Self::search(candidate).await?;
        self.commit(block).await
    }

    /// Tip, eligible pool transactions plus a reward, and the chain's config
    async fn snapshot(&self) -> Result<Candidate> {
        let storage = self.node.storage.read().await;
        let previous = storage
            .blockchain
            .latest_block()
            .cloned()
            .ok_or(LedgerError::EmptyChain)?;
        let config = storage.blockchain.config().clone();

        let mut transactions = storage.pool.valid_transactions();
        transactions.push(Transaction::reward(
            &self.wallet,
            &self.system_wallet,
            &config,
        )?);

        log::info!(
            "Mining block on {} with {} transactions",
            previous.hash,
            transactions.len()
        );

        Ok(Candidate {
            previous,
            transactions,
            config,
        })
    }

    async fn search(candidate: Candidate) -> Result<Block> {
        tokio::task::spawn_blocking(move || {
            let Candidate {
                previous,
                transactions,
                config,
            } = candidate;
            Block::mine(&previous, transactions, &config)
        })
        .await
        .map_err(|e| LedgerError::Mining(e.to_string()))?
    }

    /// Append `block` and clear the pool under one write lock, then gossip.
    /// A block that no longer extends the tip is discarded.
    async fn commit(&self, block: Block) -> Result<Option<Block>> {
        {
            let mut storage = self.node.storage.write().await;
            match storage.blockchain.append_block(block.clone()) {
                Ok(()) => storage.pool.clear(),
                Err(LedgerError::StaleBlock { expected, found }) => {
                    log::warn!(
                        "Discarding mined block {}: tip moved from {} to {}",
                        block.hash,
                        found,
                        expected
                    );
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }

        self.node.broadcast_chain().await?;
        self.node.broadcast_clear_transactions().await?;

        Ok(Some(block))
    }

    /// Mine every `period` until the task is dropped
    pub async fn run(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        // first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            match self.mine().await {
                Ok(Some(block)) => log::info!("Appended block {}", block.hash),
                Ok(None) => {}
                Err(e) => log::error!("Mining failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::TransactionValidator;
    use crate::network::{Message, Peer};
    use crate::storage::Storage;
    use crate::wallet::KeyPair;
    use tokio::net::TcpListener;

    fn fast_config() -> ChainConfig {
        ChainConfig {
            mine_rate: 1,
            ..ChainConfig::default()
        }
    }

    fn miner() -> Miner {
        let config = fast_config();
        let node = Node::new("127.0.0.1:0".parse().unwrap(), Storage::new(config.clone()).unwrap());
        Miner::new(
            node,
            Wallet::new(KeyPair::generate(), &config),
            Wallet::system(&config),
        )
    }

    #[tokio::test]
    async fn test_mine_includes_valid_transactions_and_reward() {
        let miner = miner();
        let config = fast_config();
        let sender = Wallet::new(KeyPair::generate(), &config);

        let good = Transaction::create(&sender, "R", 10).unwrap();
        let mut bad = Transaction::create(&sender, "R", 10).unwrap();
        bad.outputs[1].amount = 11;
        {
            let mut storage = miner.node.storage.write().await;
            storage.pool.add_or_update(good.clone());
            storage.pool.add_or_update(bad);
        }

        let block = miner.mine().await.unwrap().unwrap();

        assert_eq!(block.data.len(), 2);
        assert_eq!(block.data[0], good);
        let reward = &block.data[1];
        assert_eq!(reward.sender(), Some(config.blockchain_wallet_address.as_str()));
        assert_eq!(reward.outputs[1].address, miner.wallet().address());
        assert_eq!(reward.outputs[1].amount, config.mining_reward);
        // minting is not held to the signature or conservation checks
        assert!(TransactionValidator::validate(reward).is_err());

        let storage = miner.node.storage.read().await;
        assert_eq!(storage.blockchain.len(), 2);
        assert_eq!(storage.blockchain.latest_block(), Some(&block));
        assert!(storage.pool.is_empty());
        assert!(storage.blockchain.is_chain_valid(storage.blockchain.blocks()));
    }

    #[tokio::test]
    async fn test_mine_empty_pool_still_rewards() {
        let miner = miner();
        let block = miner.mine().await.unwrap().unwrap();

        assert_eq!(block.data.len(), 1);
        assert_eq!(miner.node.storage.read().await.blockchain.len(), 2);
    }

    #[tokio::test]
    async fn test_mine_uses_chain_config() {
        let config = ChainConfig {
            mining_reward: 7,
            ..fast_config()
        };
        let node = Node::new("127.0.0.1:0".parse().unwrap(), Storage::new(config.clone()).unwrap());
        let miner = Miner::new(
            node,
            Wallet::new(KeyPair::generate(), &config),
            Wallet::system(&config),
        );

        let block = miner.mine().await.unwrap().unwrap();
        assert_eq!(block.data[0].outputs[1].amount, 7);
    }

    #[tokio::test]
    async fn test_tip_moved_during_search_discards_block() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = fast_config();
        let node = Node::new(listener.local_addr().unwrap(), Storage::new(config.clone()).unwrap());
        {
            let node = node.clone();
            tokio::spawn(async move { node.serve(listener).await });
        }
        let miner = Miner::new(
            node.clone(),
            Wallet::new(KeyPair::generate(), &config),
            Wallet::system(&config),
        );

        let (_peer, mut reader) = Peer::connect(node.addr).await.unwrap();
        assert!(matches!(
            reader.receive_message().await.unwrap(),
            Some(Message::SendBlocks(_))
        ));

        let sender = Wallet::new(KeyPair::generate(), &config);
        let pending = Transaction::create(&sender, "R", 10).unwrap();
        node.storage.write().await.pool.add_or_update(pending.clone());

        let candidate = miner.snapshot().await.unwrap();

        // a longer chain arrives while the search runs
        let mut longer = Storage::new(config.clone()).unwrap();
        longer.blockchain.add_block(Vec::new()).unwrap();
        longer.blockchain.add_block(Vec::new()).unwrap();
        let longer = longer.blockchain.blocks().to_vec();
        Node::apply_message(&node.storage, Message::SendBlocks(longer.clone())).await;

        let block = Miner::search(candidate).await.unwrap();
        assert_eq!(miner.commit(block).await.unwrap(), None);

        let storage = node.storage.read().await;
        assert_eq!(storage.blockchain.blocks(), longer.as_slice());
        assert_eq!(storage.pool.transactions(), &[pending.clone()]);
        drop(storage);

        // nothing was gossiped: the next message is the one sent below
        node.broadcast_transaction(&pending).await.unwrap();
        assert_eq!(
            reader.receive_message().await.unwrap(),
            Some(Message::SendTransaction(pending))
        );
    }
}
