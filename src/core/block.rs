// Block data structures

use crate::config::ChainConfig;
use crate::consensus::ProofOfWork;
use crate::core::{hash_fields, to_canonical, Timestamp, Transaction, TxInput};
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Previous-hash sentinel carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "-";

/// Id of the transaction carried by the default genesis block
pub const GENESIS_TRANSACTION_ID: &str = "genesis";

/// Payload a block can carry: anything with a canonical serialization that
/// can be moved to the mining thread and across the wire.
pub trait BlockData: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {}

impl<T> BlockData for T where T: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {}

/// Block
///
/// Field order is the wire order: `hash, data, nonce, timestamp, difficulty,
/// previousHash`. Blocks are never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block<T = Vec<Transaction>> {
    pub hash: String,
    pub data: T,
    pub nonce: u64,
    pub timestamp: Timestamp,
    pub difficulty: u32,
    pub previous_hash: String,
}

impl<T: Serialize> Block<T> {
    /// Hash of the given block fields, in the order
    /// `data, nonce, timestamp, difficulty, previous_hash`
    pub fn hash_of(
        data: &T,
        nonce: u64,
        timestamp: Timestamp,
        difficulty: u32,
        previous_hash: &str,
    ) -> Result<String> {
        let data_json = to_canonical(data)?;
        let previous_json = to_canonical(previous_hash)?;
        Ok(hash_fields(&[
            &data_json,
            &nonce.to_string(),
            &timestamp.to_string(),
            &difficulty.to_string(),
            &previous_json,
        ]))
    }

    /// Recompute the hash from this block's own fields
    pub fn compute_hash(&self) -> Result<String> {
        Self::hash_of(
            &self.data,
            self.nonce,
            self.timestamp,
            self.difficulty,
            &self.previous_hash,
        )
    }

    /// Does the stored hash match the fields
    pub fn has_valid_hash(&self) -> bool {
        self.compute_hash().map(|hash| hash == self.hash).unwrap_or(false)
    }

    /// Genesis block for `data`. Deterministic: identical data, config and
    /// timestamp always give an identical block.
    pub fn genesis(data: T, timestamp: Timestamp, config: &ChainConfig) -> Result<Self> {
        let nonce = 0;
        let difficulty = config.difficulty;
        let hash = Self::hash_of(&data, nonce, timestamp, difficulty, GENESIS_PREVIOUS_HASH)?;

        Ok(Self {
            hash,
            data,
            nonce,
            timestamp,
            difficulty,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        })
    }

    /// Check if this is a genesis block
    pub fn is_genesis(&self) -> bool {
        self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

impl<T: BlockData> Block<T> {
    /// Mine the block that follows `previous`
    pub fn mine(previous: &Block<T>, data: T, config: &ChainConfig) -> Result<Self> {
        Ok(ProofOfWork::new(config).mine(previous, data)?.block)
    }
}

impl Block<Vec<Transaction>> {
    /// The network's canonical first block: a single placeholder transaction
    /// stamped with the configured genesis timestamp.
    pub fn canonical_genesis(config: &ChainConfig) -> Result<Self> {
        let mut transaction = Transaction::with_id(GENESIS_TRANSACTION_ID);
        transaction.input = Some(TxInput {
            amount: 0,
            address: GENESIS_PREVIOUS_HASH.to_string(),
            timestamp: config.genesis_timestamp,
            signature: GENESIS_PREVIOUS_HASH.to_string(),
        });

        Self::genesis(vec![transaction], config.genesis_timestamp, config)
    }
}
