// Chain parameters shared by every node on the network

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Hex characters in a SHA-256 digest; no difficulty can exceed it
pub const MAX_DIFFICULTY: u32 = 64;

/// Consensus and economic constants.
///
/// Peers only converge when they run with identical values: the genesis block
/// is derived from `difficulty` and `genesis_timestamp`, and block validation
/// depends on `min_difficulty` and `hash_prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Lower bound for any block difficulty
    pub min_difficulty: u32,
    /// Difficulty of the genesis block
    pub difficulty: u32,
    /// Target time between blocks, in milliseconds
    pub mine_rate: i64,
    /// Character a block hash must start with, repeated `difficulty` times
    pub hash_prefix: char,
    /// Amount credited to the miner by each reward transaction
    pub mining_reward: u64,
    /// Address of the system minting wallet
    pub blockchain_wallet_address: String,
    /// Balance every new wallet starts with
    pub initial_balance: u64,
    /// Amount the reward transaction pays back to the minting address
    pub system_mint_amount: u64,
    /// Timestamp (ms) stamped on the genesis block
    pub genesis_timestamp: i64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            min_difficulty: 1,
            difficulty: 3,
            mine_rate: 1000,
            hash_prefix: '0',
            mining_reward: 50,
            blockchain_wallet_address: "blockchain-wallet".to_string(),
            initial_balance: 500,
            system_mint_amount: 9_999_999,
            genesis_timestamp: 1_700_000_000_000,
        }
    }
}

impl ChainConfig {
    /// Load a TOML config file. Keys that are absent keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml(&text)
            .map_err(|e| LedgerError::Config(format!("{}: {}", path.display(), e)))?;
        log::info!("Loaded chain config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: ChainConfig =
            toml::from_str(text).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameters under which no block could ever be mined
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.hash_prefix, '0'..='9' | 'a'..='f') {
            return Err(LedgerError::Config(format!(
                "hash_prefix {:?} is not a lower-case hex digit",
                self.hash_prefix
            )));
        }
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds the hash length {}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.min_difficulty == 0 {
            return Err(LedgerError::Config("min_difficulty must be at least 1".into()));
        }
        if self.difficulty < self.min_difficulty {
            return Err(LedgerError::Config(format!(
                "difficulty {} is below min_difficulty {}",
                self.difficulty, self.min_difficulty
            )));
        }
        if self.mine_rate <= 0 {
            return Err(LedgerError::Config("mine_rate must be positive".into()));
        }
        Ok(())
    }
}
