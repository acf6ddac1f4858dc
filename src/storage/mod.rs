// Ledger state: the chain and the pending transaction pool

mod blockchain;
mod pool;

pub use blockchain::Blockchain;
pub use pool::TransactionPool;

use crate::config::ChainConfig;
use crate::error::Result;

/// Storage manager - the node's chain and pool, shared behind one lock
#[derive(Debug, Clone)]
pub struct Storage {
    pub blockchain: Blockchain,
    pub pool: TransactionPool,
}

impl Storage {
    /// Fresh state: canonical genesis and an empty pool
    pub fn new(config: ChainConfig) -> Result<Self> {
        Ok(Self {
            blockchain: Blockchain::with_canonical_genesis(config)?,
            pool: TransactionPool::new(),
        })
    }
}
