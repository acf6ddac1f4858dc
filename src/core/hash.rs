// Content hashing

use crate::error::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA256 of raw bytes, lower-case hex
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Canonical rendering of a value: compact JSON with struct fields in
/// declaration order. Every hashed structure goes through this.
pub fn to_canonical<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Hash pre-rendered canonical fields, concatenated in the given order.
///
/// Callers fix the order; for blocks it is
/// `data, nonce, timestamp, difficulty, previous_hash`.
pub fn hash_fields(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Hash a single value through its canonical rendering
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let canonical = to_canonical(value)?;
    Ok(hash_fields(&[&canonical]))
}

/// Fresh random identifier (UUID v4)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
