// In-memory ledger with longest-valid-chain replacement

use crate::config::ChainConfig;
use crate::consensus::ChainValidator;
use crate::core::{Block, BlockData, Transaction};
use crate::error::{LedgerError, Result};

/// Ordered chain of blocks rooted at a fixed genesis
#[derive(Debug, Clone)]
pub struct Blockchain<T = Vec<Transaction>> {
    genesis: Block<T>,
    blocks: Vec<Block<T>>,
    config: ChainConfig,
}

impl<T: BlockData> Blockchain<T> {
    pub fn new(genesis: Block<T>, config: ChainConfig) -> Self {
        Self {
            blocks: vec![genesis.clone()],
            genesis,
            config,
        }
    }

    pub fn genesis(&self) -> &Block<T> {
        &self.genesis
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn blocks(&self) -> &[Block<T>] {
        &self.blocks
    }

    pub fn latest_block(&self) -> Option<&Block<T>> {
        self.blocks.last()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Mine `data` on top of the current tip and append it. Blocks the
    /// calling thread for the whole nonce search.
    pub fn add_block(&mut self, data: T) -> Result<Block<T>> {
        let previous = self.latest_block().ok_or(LedgerError::EmptyChain)?;
        let block = Block::mine(previous, data, &self.config)?;
        self.blocks.push(block.clone());
        Ok(block)
    }

    /// Append a block mined elsewhere, provided it still extends the tip
    pub fn append_block(&mut self, block: Block<T>) -> Result<()> {
        let tip = self.latest_block().ok_or(LedgerError::EmptyChain)?;

        if block.previous_hash != tip.hash {
            return Err(LedgerError::StaleBlock {
                expected: tip.hash.clone(),
                found: block.previous_hash,
            });
        }

        let validator = ChainValidator::new(&self.config);
        validator.validate_link(tip, &block, self.blocks.len())?;

        self.blocks.push(block);
        Ok(())
    }

    /// Is `candidate` a well-formed chain rooted at our genesis
    pub fn is_chain_valid(&self, candidate: &[Block<T>]) -> bool {
        let validator = ChainValidator::new(&self.config);
        match validator.validate_chain(&self.genesis, candidate) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Invalid chain: {}", e);
                false
            }
        }
    }

    /// Replace the local chain if `candidate` is strictly longer and valid
    pub fn reset_chain(&mut self, candidate: Vec<Block<T>>) -> bool {
        if candidate.len() <= self.blocks.len() {
            log::info!(
                "Received chain is not longer than the current chain ({} <= {})",
                candidate.len(),
                self.blocks.len()
            );
            return false;
        }

        if !self.is_chain_valid(&candidate) {
            log::warn!("Received chain is invalid");
            return false;
        }

        log::info!(
            "Replacing chain of length {} with chain of length {}",
            self.blocks.len(),
            candidate.len()
        );
        self.blocks = candidate;
        true
    }
}

impl Blockchain<Vec<Transaction>> {
    /// Chain holding only the network's canonical genesis block
    pub fn with_canonical_genesis(config: ChainConfig) -> Result<Self> {
        let genesis = Block::canonical_genesis(&config)?;
        Ok(Self::new(genesis, config))
    }
}
