// Chain and transaction validation

use crate::config::ChainConfig;
use crate::consensus::pow::ProofOfWork;
use crate::core::{to_canonical, Block, Transaction};
use serde::Serialize;

/// Validation error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Candidate chain has no blocks
    EmptyChain,
    /// First block differs from the canonical genesis
    GenesisMismatch,
    /// Stored hash does not match the block's fields
    HashMismatch { index: usize },
    /// `previous_hash` does not point at the prior block
    BrokenLink { index: usize },
    /// Hash lacks the leading characters its difficulty requires
    InsufficientWork { index: usize },
    /// Difficulty moved by more than one step from the prior block
    DifficultyJump { index: usize },
    /// Transaction was never signed
    MissingInput,
    /// Signed input amount differs from the sum of the outputs
    ConservationViolation { input: u64, outputs: Option<u64> },
    /// Signature does not verify over the outputs
    InvalidSignature,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ValidationError::EmptyChain => write!(f, "Chain has no blocks"),
            ValidationError::GenesisMismatch => write!(f, "Genesis block mismatch"),
            ValidationError::HashMismatch { index } => write!(f, "Block {} hash mismatch", index),
            ValidationError::BrokenLink { index } => {
                write!(f, "Block {} does not link to its predecessor", index)
            }
            ValidationError::InsufficientWork { index } => {
                write!(f, "Block {} has insufficient proof of work", index)
            }
            ValidationError::DifficultyJump { index } => {
                write!(f, "Block {} difficulty jumped more than one step", index)
            }
            ValidationError::MissingInput => write!(f, "Missing input"),
            ValidationError::ConservationViolation { input, outputs } => match outputs {
                Some(outputs) => write!(f, "Input {} does not match outputs {}", input, outputs),
                None => write!(f, "Input {} does not match overflowing outputs", input),
            },
            ValidationError::InvalidSignature => write!(f, "Invalid signature"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Chain validator
pub struct ChainValidator<'a> {
    pow: ProofOfWork<'a>,
}

impl<'a> ChainValidator<'a> {
    pub fn new(config: &'a ChainConfig) -> Self {
        Self {
            pow: ProofOfWork::new(config),
        }
    }

    /// Validate `candidate` on its own: genesis equality, then every block's
    /// hash, link, work and difficulty step against the candidate's own prior
    /// block.
    ///
    /// The work and difficulty-step checks are a strengthening over hash and
    /// link recomputation alone. Blocks produced by `ProofOfWork::mine` always
    /// pass them; only hand-built blocks can fail.
    pub fn validate_chain<T: Serialize>(
        &self,
        genesis: &Block<T>,
        candidate: &[Block<T>],
    ) -> Result<(), ValidationError> {
        let first = candidate.first().ok_or(ValidationError::EmptyChain)?;

        if !Self::same_serialization(first, genesis) {
            return Err(ValidationError::GenesisMismatch);
        }

        for (index, pair) in candidate.windows(2).enumerate() {
            self.validate_link(&pair[0], &pair[1], index + 1)?;
        }

        Ok(())
    }

    /// Validate `block` as the successor of `previous`
    pub fn validate_link<T: Serialize>(
        &self,
        previous: &Block<T>,
        block: &Block<T>,
        index: usize,
    ) -> Result<(), ValidationError> {
        if block.previous_hash != previous.hash {
            return Err(ValidationError::BrokenLink { index });
        }

        if !block.has_valid_hash() {
            return Err(ValidationError::HashMismatch { index });
        }

        if !self.pow.verify(block) {
            return Err(ValidationError::InsufficientWork { index });
        }

        if block.difficulty.abs_diff(previous.difficulty) > 1 {
            return Err(ValidationError::DifficultyJump { index });
        }

        Ok(())
    }

    fn same_serialization<T: Serialize>(a: &Block<T>, b: &Block<T>) -> bool {
        match (to_canonical(a), to_canonical(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Transaction validator (pool admission)
pub struct TransactionValidator;

impl TransactionValidator {
    /// Check input presence, conservation and signature
    pub fn validate(tx: &Transaction) -> Result<(), ValidationError> {
        let input = tx.input.as_ref().ok_or(ValidationError::MissingInput)?;

        let outputs = tx.total_output();
        if outputs != Some(input.amount) {
            return Err(ValidationError::ConservationViolation {
                input: input.amount,
                outputs,
            });
        }

        match tx.verify() {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(ValidationError::InvalidSignature),
        }
    }
}
