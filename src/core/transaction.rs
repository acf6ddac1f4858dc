// Output-based transactions

use crate::config::ChainConfig;
use crate::core::{hash_value, new_id, verify_signature, current_timestamp, Amount, Timestamp};
use crate::error::{LedgerError, Result};
use crate::wallet::Wallet;
use serde::{Deserialize, Serialize};

/// Signed snapshot of the sender at signing time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Sender balance when the transaction was signed (not the amount sent)
    pub amount: Amount,
    /// Sender public key, hex
    pub address: String,
    pub timestamp: Timestamp,
    /// DER signature over the hash of the outputs, hex
    pub signature: String,
}

/// Credit of `amount` to `address`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: Amount,
    pub address: String,
}

impl TxOutput {
    pub fn new(amount: Amount, address: impl Into<String>) -> Self {
        Self {
            amount,
            address: address.into(),
        }
    }
}

/// Transaction
///
/// Created unsigned, signed once its outputs are final, and possibly updated
/// (outputs added, re-signed) while still pending in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Create an empty, unsigned transaction with a fresh id
    pub fn new() -> Self {
        Self::with_id(new_id())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            input: None,
            outputs: Vec::new(),
        }
    }

    /// Build a transaction from `outputs` and sign it with `sender`
    pub fn with_outputs(sender: &Wallet, outputs: Vec<TxOutput>) -> Result<Self> {
        let mut tx = Self::new();
        tx.outputs = outputs;
        tx.sign(sender)?;
        Ok(tx)
    }

    /// Transfer `amount` from `sender` to `recipient`.
    ///
    /// Outputs are the change back to the sender followed by the payment.
    pub fn create(sender: &Wallet, recipient: &str, amount: Amount) -> Result<Self> {
        let balance = sender.balance();
        if amount > balance {
            return Err(LedgerError::InsufficientBalance { amount, balance });
        }

        let outputs = vec![
            TxOutput::new(balance - amount, sender.address()),
            TxOutput::new(amount, recipient),
        ];

        Self::with_outputs(sender, outputs)
    }

    /// Mining reward, signed by the system wallet.
    ///
    /// The minting wallet's balance is deliberately not checked, so the signed
    /// input amount does not match the outputs here.
    pub fn reward(miner: &Wallet, system: &Wallet, config: &ChainConfig) -> Result<Self> {
        let outputs = vec![
            TxOutput::new(config.system_mint_amount, config.blockchain_wallet_address.as_str()),
            TxOutput::new(config.mining_reward, miner.address()),
        ];

        Self::with_outputs(system, outputs)
    }

    /// Hash the outputs are signed over
    pub fn outputs_hash(&self) -> Result<String> {
        hash_value(&self.outputs)
    }

    /// Set the input from the sender's current balance and a fresh signature
    pub fn sign(&mut self, sender: &Wallet) -> Result<()> {
        let signature = sender.sign(&self.outputs_hash()?)?;
        self.input = Some(TxInput {
            amount: sender.balance(),
            address: sender.address().to_string(),
            timestamp: current_timestamp(),
            signature,
        });
        Ok(())
    }

    /// Check the input signature against the current outputs
    pub fn verify(&self) -> Result<bool> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| LedgerError::MissingInput(self.id.clone()))?;

        Ok(verify_signature(
            &input.address,
            &self.outputs_hash()?,
            &input.signature,
        ))
    }

    /// Pay `amount` to another recipient out of the sender's own output, then re-sign
    pub fn update(&mut self, sender: &Wallet, recipient: &str, amount: Amount) -> Result<()> {
        let own_output = self
            .outputs
            .iter_mut()
            .find(|output| output.address == sender.address())
            .ok_or(LedgerError::InsufficientBalance { amount, balance: 0 })?;

        if amount > own_output.amount {
            return Err(LedgerError::InsufficientBalance {
                amount,
                balance: own_output.amount,
            });
        }

        own_output.amount -= amount;
        self.outputs.push(TxOutput::new(amount, recipient));

        self.sign(sender)
    }

    /// Sum of output amounts, `None` on overflow
    pub fn total_output(&self) -> Option<Amount> {
        self.outputs
            .iter()
            .try_fold(0u64, |total, output| total.checked_add(output.amount))
    }

    /// Address that signed this transaction, if any
    pub fn sender(&self) -> Option<&str> {
        self.input.as_ref().map(|input| input.address.as_str())
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::KeyPair;

    fn wallet_with_balance(balance: Amount) -> Wallet {
        let config = ChainConfig {
            initial_balance: balance,
            ..ChainConfig::default()
        };
        Wallet::new(KeyPair::generate(), &config)
    }

    #[test]
    fn test_create_splits_change_and_payment() {
        let sender = wallet_with_balance(50);
        let tx = Transaction::create(&sender, "R", 20).unwrap();

        assert_eq!(
            tx.outputs,
            vec![TxOutput::new(30, sender.address()), TxOutput::new(20, "R")]
        );

        let input = tx.input.as_ref().unwrap();
        assert_eq!(input.amount, 50);
        assert_eq!(input.address, sender.address());
        assert_eq!(tx.total_output(), Some(input.amount));
        assert!(tx.verify().unwrap());
    }

    #[test]
    fn test_create_insufficient_balance() {
        let sender = wallet_with_balance(50);
        let result = Transaction::create(&sender, "R", 51);

        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { amount: 51, balance: 50 })
        ));
    }

    #[test]
    fn test_create_whole_balance() {
        let sender = wallet_with_balance(50);
        let tx = Transaction::create(&sender, "R", 50).unwrap();
        assert_eq!(tx.outputs[0].amount, 0);
    }

    #[test]
    fn test_tampered_outputs_fail_verification() {
        let sender = wallet_with_balance(50);
        let mut tx = Transaction::create(&sender, "R", 20).unwrap();

        tx.outputs[1].amount = 40;
        tx.outputs[0].amount = 10;

        assert!(!tx.verify().unwrap());
    }

    #[test]
    fn test_verify_missing_input() {
        let tx = Transaction::with_id("unsigned");
        assert!(matches!(tx.verify(), Err(LedgerError::MissingInput(id)) if id == "unsigned"));
    }

    #[test]
    fn test_update_adds_recipient_and_resigns() {
        let sender = wallet_with_balance(50);
        let mut tx = Transaction::create(&sender, "R", 20).unwrap();
        let first_signature = tx.input.as_ref().unwrap().signature.clone();

        tx.update(&sender, "S", 10).unwrap();

        assert_eq!(tx.outputs.len(), 3);
        assert_eq!(tx.outputs[0].amount, 20);
        assert_eq!(tx.outputs[2], TxOutput::new(10, "S"));
        assert_eq!(tx.total_output(), Some(50));
        assert_ne!(tx.input.as_ref().unwrap().signature, first_signature);
        assert!(tx.verify().unwrap());
    }

    #[test]
    fn test_update_exceeding_own_output() {
        let sender = wallet_with_balance(50);
        let mut tx = Transaction::create(&sender, "R", 20).unwrap();
        let before = tx.clone();

        let result = tx.update(&sender, "S", 31);

        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { amount: 31, balance: 30 })
        ));
        assert_eq!(tx, before);
    }

    #[test]
    fn test_reward_transaction() {
        let config = ChainConfig::default();
        let miner = Wallet::new(KeyPair::generate(), &config);
        let system = Wallet::system(&config);

        let tx = Transaction::reward(&miner, &system, &config).unwrap();

        assert_eq!(tx.outputs[0].address, config.blockchain_wallet_address);
        assert_eq!(tx.outputs[0].amount, config.system_mint_amount);
        assert_eq!(tx.outputs[1], TxOutput::new(config.mining_reward, miner.address()));
        assert_eq!(tx.sender(), Some(config.blockchain_wallet_address.as_str()));
    }

    #[test]
    fn test_wire_shape() {
        let unsigned = Transaction::with_id("t1");
        let json = serde_json::to_string(&unsigned).unwrap();
        assert_eq!(json, r#"{"id":"t1","outputs":[]}"#);

        let decoded: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, unsigned);
    }

    #[test]
    fn test_total_output_overflow() {
        let mut tx = Transaction::with_id("big");
        tx.outputs = vec![TxOutput::new(u64::MAX, "a"), TxOutput::new(1, "b")];
        assert_eq!(tx.total_output(), None);
    }
}
