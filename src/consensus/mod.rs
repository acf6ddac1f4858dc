// Consensus and validation logic

pub mod pow;
pub mod validation;

pub use pow::{adjust_difficulty, meets_difficulty, MiningResult, ProofOfWork};
pub use validation::{ChainValidator, TransactionValidator, ValidationError};
