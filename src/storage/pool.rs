// Pending transaction pool

use crate::consensus::TransactionValidator;
use crate::core::Transaction;

/// Transactions waiting to be mined, unique by id, in arrival order
#[derive(Debug, Default, Clone)]
pub struct TransactionPool {
    transactions: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tx`, or replace the pending transaction with the same id
    pub fn add_or_update(&mut self, tx: Transaction) {
        match self.transactions.iter_mut().find(|pending| pending.id == tx.id) {
            Some(pending) => {
                log::debug!("Replacing pending transaction {}", tx.id);
                *pending = tx;
            }
            None => {
                log::debug!("Adding transaction {} to pool", tx.id);
                self.transactions.push(tx);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == id)
    }

    /// First pending transaction signed by `address`
    pub fn find_by_sender(&self, address: &str) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|tx| tx.sender() == Some(address))
    }

    /// Transactions eligible for the next block.
    ///
    /// Rejected transactions are logged and stay in the pool untouched.
    pub fn valid_transactions(&self) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|tx| match TransactionValidator::validate(tx) {
                Ok(()) => true,
                Err(e) => {
                    log::error!(
                        "Invalid transaction {} from {}: {}",
                        tx.id,
                        tx.sender().unwrap_or("<unsigned>"),
                        e
                    );
                    false
                }
            })
            .cloned()
            .collect()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;
    use crate::wallet::{KeyPair, Wallet};

    fn wallet() -> Wallet {
        let config = ChainConfig {
            initial_balance: 50,
            ..ChainConfig::default()
        };
        Wallet::new(KeyPair::generate(), &config)
    }

    #[test]
    fn test_add_and_replace_by_id() {
        let sender = wallet();
        let mut pool = TransactionPool::new();

        let mut tx = Transaction::create(&sender, "R", 20).unwrap();
        pool.add_or_update(tx.clone());
        assert_eq!(pool.len(), 1);

        tx.update(&sender, "S", 5).unwrap();
        pool.add_or_update(tx.clone());

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(&tx.id), Some(&tx));
    }

    #[test]
    fn test_find_by_sender() {
        let sender = wallet();
        let other = wallet();
        let mut pool = TransactionPool::new();

        let tx = Transaction::create(&sender, "R", 20).unwrap();
        pool.add_or_update(tx.clone());

        assert_eq!(pool.find_by_sender(sender.address()), Some(&tx));
        assert!(pool.find_by_sender(other.address()).is_none());
    }

    #[test]
    fn test_valid_transactions_filters_and_keeps_pool() {
        let sender = wallet();
        let mut pool = TransactionPool::new();

        let good = Transaction::create(&sender, "R", 20).unwrap();

        let mut inflated = Transaction::create(&sender, "R", 20).unwrap();
        inflated.outputs[1].amount = 9999;

        let mut forged = Transaction::create(&sender, "R", 20).unwrap();
        forged.outputs[0].amount = 25;
        forged.outputs[1].amount = 25;

        let unsigned = Transaction::with_id("unsigned");

        pool.add_or_update(good.clone());
        pool.add_or_update(inflated.clone());
        pool.add_or_update(forged.clone());
        pool.add_or_update(unsigned);

        assert_eq!(pool.valid_transactions(), vec![good]);
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.get(&inflated.id), Some(&inflated));
        assert_eq!(pool.get(&forged.id), Some(&forged));
    }

    #[test]
    fn test_resubmission_replaces_invalid() {
        let sender = wallet();
        let mut pool = TransactionPool::new();

        let mut tx = Transaction::create(&sender, "R", 20).unwrap();
        let original = tx.clone();
        tx.outputs[1].amount = 40;
        pool.add_or_update(tx);
        assert!(pool.valid_transactions().is_empty());

        pool.add_or_update(original.clone());
        assert_eq!(pool.valid_transactions(), vec![original]);
    }

    #[test]
    fn test_clear() {
        let mut pool = TransactionPool::new();
        pool.add_or_update(Transaction::create(&wallet(), "R", 1).unwrap());
        pool.clear();

        assert!(pool.is_empty());
        assert!(pool.transactions().is_empty());
    }
}
