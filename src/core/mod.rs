// Core ledger data structures

mod types;
mod hash;
mod signature;
mod transaction;
mod block;

pub use types::*;
pub use hash::*;
pub use signature::*;
pub use transaction::*;
pub use block::*;
