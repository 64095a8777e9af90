//! Hashing - SHA-256 Digests of Exported Payloads
//!
//! Lets whoever receives a payload verify what was written.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return lowercase hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
