// Proof-of-work ledger replicated over peer gossip

pub mod cli;
pub mod config;
pub mod consensus;
pub mod core;
pub mod error;
pub mod miner;
pub mod network;
pub mod storage;
pub mod wallet;

// Re-exports for convenience
pub use cli::{Cli, CliHandler, Commands};
pub use config::ChainConfig;
pub use consensus::{ChainValidator, ProofOfWork, TransactionValidator, ValidationError};
pub use crate::core::{Block, Transaction, TxInput, TxOutput};
pub use error::{LedgerError, Result};
pub use miner::Miner;
pub use network::{Message, MessageType, Node, Peer, PeerInfo};
pub use storage::{Blockchain, Storage, TransactionPool};
pub use wallet::{KeyPair, Wallet};
