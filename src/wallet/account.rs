// Wallet: key pair plus a cached, incrementally recomputed balance

use crate::config::ChainConfig;
use crate::core::{Amount, Timestamp, Transaction};
use crate::error::{LedgerError, Result};
use crate::storage::{Blockchain, TransactionPool};
use crate::wallet::KeyPair;

#[derive(Debug, Clone)]
pub struct Wallet {
    keypair: KeyPair,
    address: String,
    balance: Amount,
    /// Timestamp of the latest block already folded into `balance`
    last_balance_timestamp: Option<Timestamp>,
}

impl Wallet {
    /// Wallet for `keypair`, starting from the configured initial balance
    pub fn new(keypair: KeyPair, config: &ChainConfig) -> Self {
        let address = keypair.address();
        Self {
            keypair,
            address,
            balance: config.initial_balance,
            last_balance_timestamp: None,
        }
    }

    /// The minting wallet. Signs with a throwaway key under the configured
    /// system address, so its signatures never verify.
    pub fn system(config: &ChainConfig) -> Self {
        Self {
            address: config.blockchain_wallet_address.clone(),
            ..Self::new(KeyPair::generate(), config)
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Balance as of the last call to `calculate_balance`
    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    pub fn sign(&self, digest_hex: &str) -> Result<String> {
        self.keypair.sign(digest_hex)
    }

    /// Fold blocks newer than the watermark into the cached balance.
    ///
    /// The cached value is reused only when the latest block is the one the
    /// watermark points at. Otherwise scanning resumes after the block whose
    /// timestamp equals the watermark, or from genesis if none does.
    pub fn calculate_balance(&mut self, blockchain: &Blockchain) -> Result<Amount> {
        let latest = blockchain.latest_block().ok_or(LedgerError::EmptyChain)?;

        if self.last_balance_timestamp == Some(latest.timestamp) {
            return Ok(self.balance);
        }

        let blocks = blockchain.blocks();
        let start = self
            .last_balance_timestamp
            .and_then(|watermark| blocks.iter().rposition(|block| block.timestamp == watermark))
            .map(|index| index + 1)
            .unwrap_or(0);

        let mut balance = self.balance;
        for tx in blocks[start..].iter().flat_map(|block| block.data.iter()) {
            let Some(sender) = tx.sender() else {
                continue;
            };

            let paid = tx.outputs.iter().skip(1);
            if sender == self.address {
                let withdrawn: Amount = paid.map(|output| output.amount).sum();
                balance = balance.saturating_sub(withdrawn);
            } else {
                let deposited: Amount = paid
                    .filter(|output| output.address == self.address)
                    .map(|output| output.amount)
                    .sum();
                balance = balance.saturating_add(deposited);
            }
        }

        log::debug!(
            "Balance of {} recalculated from block {}: {}",
            self.address,
            start,
            balance
        );

        self.balance = balance;
        self.last_balance_timestamp = Some(latest.timestamp);
        Ok(balance)
    }

    /// Pay `amount` to `recipient`, extending this wallet's pending pool
    /// transaction if it has one.
    ///
    /// The pool is only touched once the transaction is fully built and signed.
    pub fn create_or_update_transaction(
        &mut self,
        recipient: &str,
        amount: Amount,
        blockchain: &Blockchain,
        pool: &mut TransactionPool,
    ) -> Result<Transaction> {
        let balance = self.calculate_balance(blockchain)?;
        if amount > balance {
            return Err(LedgerError::InsufficientBalance { amount, balance });
        }

        let tx = match pool.find_by_sender(&self.address) {
            Some(pending) => {
                let mut tx = pending.clone();
                tx.update(self, recipient, amount)?;
                tx
            }
            None => Transaction::create(self, recipient, amount)?,
        };

        pool.add_or_update(tx.clone());
        Ok(tx)
    }
}
