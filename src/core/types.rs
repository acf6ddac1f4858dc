// Basic scalar types shared by blocks and transactions

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Amount of value carried by an output or input
pub type Amount = u64;

/// Current wall-clock time in milliseconds.
///
/// A clock set before the epoch reads as 0 rather than failing.
pub fn current_timestamp() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}
