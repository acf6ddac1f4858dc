// Proof of Work: nonce search and per-block difficulty retarget

use crate::config::{ChainConfig, MAX_DIFFICULTY};
use crate::core::{current_timestamp, hash_fields, to_canonical, Block, BlockData, Timestamp};
use crate::error::Result;
use std::time::{Duration, Instant};

/// Next difficulty given the previous block and a candidate timestamp.
///
/// Single-step retarget: one up if the previous block is younger than
/// `mine_rate`, one down otherwise, kept within `min_difficulty` and the
/// hash length.
pub fn adjust_difficulty<T>(previous: &Block<T>, timestamp: Timestamp, config: &ChainConfig) -> u32 {
    let difficulty = if previous.timestamp.saturating_add(config.mine_rate) > timestamp {
        previous.difficulty.saturating_add(1)
    } else {
        previous.difficulty.saturating_sub(1)
    };

    difficulty.clamp(config.min_difficulty, MAX_DIFFICULTY.max(config.min_difficulty))
}

/// Does `hash` start with `difficulty` copies of `prefix`
pub fn meets_difficulty(hash: &str, difficulty: u32, prefix: char) -> bool {
    let mut chars = hash.chars();
    (0..difficulty).all(|_| chars.next() == Some(prefix))
}

/// Brute-force nonce search for the block following `previous`
pub struct ProofOfWork<'a> {
    config: &'a ChainConfig,
}

impl<'a> ProofOfWork<'a> {
    pub fn new(config: &'a ChainConfig) -> Self {
        Self { config }
    }

    /// Search until a hash meets the difficulty in force at the moment it was
    /// computed. Runs to completion; there is no cancellation.
    pub fn mine<T: BlockData>(&self, previous: &Block<T>, data: T) -> Result<MiningResult<T>> {
        let start_time = Instant::now();
        let data_json = to_canonical(&data)?;
        let previous_json = to_canonical(&previous.hash)?;
        let mut nonce = 0u64;

        loop {
            let timestamp = current_timestamp();
            let difficulty = adjust_difficulty(previous, timestamp, self.config);
            let hash = hash_fields(&[
                &data_json,
                &nonce.to_string(),
                &timestamp.to_string(),
                &difficulty.to_string(),
                &previous_json,
            ]);

            if meets_difficulty(&hash, difficulty, self.config.hash_prefix) {
                let block = Block {
                    hash,
                    data,
                    nonce,
                    timestamp,
                    difficulty,
                    previous_hash: previous.hash.clone(),
                };
                let result = MiningResult {
                    block,
                    attempts: nonce + 1,
                    duration: start_time.elapsed(),
                };
                log::info!(
                    "Mined block {} (nonce {}, difficulty {}, {} attempts in {:?}, {:.1} KH/s)",
                    result.block.hash,
                    result.block.nonce,
                    result.block.difficulty,
                    result.attempts,
                    result.duration,
                    result.hash_rate() / 1000.0
                );
                return Ok(result);
            }

            nonce += 1;

            if nonce % 100_000 == 0 {
                let elapsed = start_time.elapsed();
                log::debug!(
                    "Mining attempts: {} ({:.1} KH/s)",
                    nonce,
                    nonce as f64 / elapsed.as_secs_f64() / 1000.0
                );
            }
        }
    }

    /// Does a block carry the work its difficulty claims
    pub fn verify<T>(&self, block: &Block<T>) -> bool {
        block.difficulty >= self.config.min_difficulty
            && meets_difficulty(&block.hash, block.difficulty, self.config.hash_prefix)
    }
}

/// Mining result
#[derive(Debug)]
pub struct MiningResult<T> {
    pub block: Block<T>,
    /// Number of hashes computed
    pub attempts: u64,
    pub duration: Duration,
}

impl<T> MiningResult<T> {
    /// Hashes per second
    pub fn hash_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.attempts as f64 / secs
        } else {
            0.0
        }
    }
}
