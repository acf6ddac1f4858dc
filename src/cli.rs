// CLI commands

use crate::config::ChainConfig;
use crate::core::Block;
use crate::error::{LedgerError, Result};
use crate::miner::Miner;
use crate::network::{Message, Node, Peer};
use crate::storage::{Blockchain, Storage, TransactionPool};
use crate::wallet::{KeyPair, Wallet};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "gossip-ledger")]
#[command(about = "Proof-of-work ledger replicated over peer gossip", long_about = None)]
pub struct Cli {
    /// Chain parameters (TOML); defaults apply when omitted
    #[arg(long, env = "CHAIN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a gossip node
    Node {
        /// Address to accept peer connections on
        #[arg(long, env = "P2P_ADDR", default_value = "127.0.0.1:5001")]
        p2p_addr: SocketAddr,

        /// Peers to dial on startup
        #[arg(long, env = "PEERS", value_delimiter = ',')]
        peers: Vec<SocketAddr>,

        /// Mine a block every N seconds
        #[arg(long, env = "MINE_INTERVAL")]
        mine_interval: Option<u64>,

        /// Key receiving mining rewards; a fresh key is used if omitted
        #[arg(long, env = "KEY_FILE")]
        key_file: Option<PathBuf>,
    },

    /// Print the genesis block
    Genesis,

    /// Generate a key file
    Keygen {
        #[arg(long)]
        out: PathBuf,
    },

    /// Sign a transfer and gossip it to a node
    Send {
        /// Node to submit to
        #[arg(long)]
        peer: SocketAddr,
        /// Recipient address
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
        /// Sender key
        #[arg(long, env = "KEY_FILE")]
        key_file: PathBuf,
    },
}

/// CLI handler
pub struct CliHandler {
    config: ChainConfig,
}

impl CliHandler {
    /// Create a handler, loading chain parameters if a file is given
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => ChainConfig::load(path)?,
            None => ChainConfig::default(),
        };
        config.validate()?;

        Ok(Self { config })
    }

    /// Handle CLI command
    pub async fn handle(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Node {
                p2p_addr,
                peers,
                mine_interval,
                key_file,
            } => self.run_node(p2p_addr, &peers, mine_interval, key_file).await,
            Commands::Genesis => self.genesis(),
            Commands::Keygen { out } => self.keygen(&out),
            Commands::Send {
                peer,
                to,
                amount,
                key_file,
            } => self.send(peer, &to, amount, &key_file).await,
        }
    }

    async fn run_node(
        &self,
        addr: SocketAddr,
        peers: &[SocketAddr],
        mine_interval: Option<u64>,
        key_file: Option<PathBuf>,
    ) -> Result<()> {
        let keypair = match key_file {
            Some(path) => KeyPair::load(path)?,
            None => KeyPair::generate(),
        };
        let wallet = Wallet::new(keypair, &self.config);
        log::info!("Node wallet address: {}", wallet.address());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LedgerError::Network(format!("Failed to bind {}: {}", addr, e)))?;
        let node = Node::new(listener.local_addr()?, Storage::new(self.config.clone())?);

        let server = {
            let node = node.clone();
            tokio::spawn(async move { node.serve(listener).await })
        };

        node.connect_to_peers(peers).await;

        let mining = mine_interval.map(|secs| {
            let miner = Miner::new(
                node.clone(),
                wallet,
                Wallet::system(&self.config),
            );
            tokio::spawn(async move { miner.run(Duration::from_secs(secs.max(1))).await })
        });

        tokio::select! {
            result = server => {
                result.map_err(|e| LedgerError::Network(e.to_string()))??;
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                log::info!("Shutting down");
            }
        }

        if let Some(mining) = mining {
            mining.abort();
        }

        let storage = node.storage.read().await;
        println!("Chain length: {}", storage.blockchain.len());
        println!("Pending transactions: {}", storage.pool.len());

        Ok(())
    }

    fn genesis(&self) -> Result<()> {
        let genesis = Block::canonical_genesis(&self.config)?;
        println!("{}", serde_json::to_string_pretty(&genesis)?);
        Ok(())
    }

    fn keygen(&self, out: &Path) -> Result<()> {
        let keypair = KeyPair::generate();
        keypair.save(out)?;
        println!("Address: {}", keypair.address());
        Ok(())
    }

    /// Join `peer` just long enough to learn its chain and hand it a transaction
    async fn send(&self, peer: SocketAddr, to: &str, amount: u64, key_file: &Path) -> Result<()> {
        let mut wallet = Wallet::new(KeyPair::load(key_file)?, &self.config);
        let mut blockchain = Blockchain::with_canonical_genesis(self.config.clone())?;

        let (connection, mut reader) = Peer::connect(peer).await?;

        match reader.receive_message().await? {
            Some(Message::SendBlocks(blocks)) => {
                if blocks.len() > 1 && !blockchain.reset_chain(blocks) {
                    return Err(LedgerError::Network(format!(
                        "{} sent a chain that does not validate",
                        peer
                    )));
                }
            }
            Some(other) => {
                return Err(LedgerError::Network(format!(
                    "Expected chain from {}, got {}",
                    peer,
                    other.message_type().as_str()
                )));
            }
            None => {
                return Err(LedgerError::Network(format!(
                    "{} closed the connection",
                    peer
                )));
            }
        }

        let mut pool = TransactionPool::new();
        let tx = wallet.create_or_update_transaction(to, amount, &blockchain, &mut pool)?;

        connection.send_message(&Message::SendTransaction(tx.clone()))?;
        connection.close().await;

        println!("Transaction sent:");
        println!("  ID: {}", tx.id);
        println!("  From: {}", wallet.address());
        println!("  Balance: {}", wallet.balance());
        for output in &tx.outputs {
            println!("  -> {} {}", output.amount, output.address);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_command() {
        let cli = Cli::try_parse_from([
            "gossip-ledger",
            "node",
            "--p2p-addr",
            "127.0.0.1:6000",
            "--peers",
            "127.0.0.1:6001,127.0.0.1:6002",
            "--mine-interval",
            "5",
        ])
        .unwrap();

        match cli.command {
            Commands::Node {
                p2p_addr,
                peers,
                mine_interval,
                key_file,
            } => {
                assert_eq!(p2p_addr, "127.0.0.1:6000".parse().unwrap());
                assert_eq!(peers.len(), 2);
                assert_eq!(mine_interval, Some(5));
                assert!(key_file.is_none());
            }
            _ => panic!("expected node command"),
        }
    }

    #[test]
    fn test_parse_send_command() {
        let cli = Cli::try_parse_from([
            "gossip-ledger",
            "send",
            "--peer",
            "127.0.0.1:6000",
            "--to",
            "02ab",
            "--amount",
            "20",
            "--key-file",
            "key.json",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Send { amount: 20, .. }));
    }

    #[test]
    fn test_keygen_writes_loadable_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");

        let handler = CliHandler::new(None).unwrap();
        handler.keygen(&path).unwrap();

        assert!(KeyPair::load(&path).is_ok());
    }

    #[tokio::test]
    async fn test_send_submits_to_node() {
        let config = ChainConfig::default();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let node = Node::new(listener.local_addr().unwrap(), Storage::new(config).unwrap());
        {
            let node = node.clone();
            tokio::spawn(async move { node.serve(listener).await });
        }

        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.json");
        KeyPair::generate().save(&key_file).unwrap();

        let handler = CliHandler::new(None).unwrap();
        handler.send(node.addr, "R", 25, &key_file).await.unwrap();

        for _ in 0..100 {
            if !node.storage.read().await.pool.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let storage = node.storage.read().await;
        let pending = storage.pool.valid_transactions();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].outputs[1].amount, 25);
    }
}
