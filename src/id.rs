//! Identifier and clock utilities for spacedrep
//!
//! Content-derived hashes for action logs, and the wall clock used at the
//! outermost layer (the CLI). Nothing below the CLI reads the clock; every
//! scheduling function takes its time inputs as arguments.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Canonical JSON text for a value: object keys sorted, no whitespace.
///
/// `serde_json::Value` objects are ordered maps keyed by string, so keys come
/// out sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    value.to_string()
}

/// Compute the SHA-256 of bytes, returning a lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash the canonical JSON form of a value.
pub fn content_hash(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}
