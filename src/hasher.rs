//! Content hash over the canonical record.
//!
//! The canonical form is the compact JSON serialization of
//! [`FingerprintRecord`], whose key order is fixed by the struct
//! declaration rather than by probe completion order. The hash is computed
//! before it exists in any record, so it never covers itself.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::record::FingerprintRecord;

/// Deterministic string form of `record`
pub fn canonicalize(record: &FingerprintRecord) -> Result<String> {
    Ok(serde_json::to_string(record)?)
}

/// Lowercase hex SHA-256 of a string
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Lowercase hex SHA-256 of the canonical record (64 chars)
pub fn content_hash(record: &FingerprintRecord) -> Result<String> {
    let canonical = canonicalize(record)?;
    Ok(sha256_hex(&canonical))
}
