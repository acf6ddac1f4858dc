// Crate-wide error type

use crate::consensus::ValidationError;
use thiserror::Error;

/// Result alias used across the ledger
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amount exceeds the sender's known balance or pending output
    #[error("amount {amount} exceeds balance {balance}")]
    InsufficientBalance { amount: u64, balance: u64 },
    /// Transaction was never signed
    #[error("transaction {0} has no input")]
    MissingInput(String),
    #[error("invalid chain: {0}")]
    InvalidChain(#[from] ValidationError),
    /// Mined block no longer extends the current tip
    #[error("stale block: expected previous hash {expected}, found {found}")]
    StaleBlock { expected: String, found: String },
    #[error("mining task failed: {0}")]
    Mining(String),
    #[error("ledger has no blocks")]
    EmptyChain,
    #[error("unknown message kind: {0}")]
    UnknownMessageKind(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
