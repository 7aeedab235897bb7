//! Content fingerprinting for outbound payloads.
//!
//! The deduplication ledger keys on a stable hash of the serialized wire
//! payload. SHA-256 in lowercase hex; any collision-resistant 256-bit hash
//! satisfies the contract, this one matches what the rest of the stack
//! already links.

use sha2::{Digest, Sha256};

/// Compute the content fingerprint of a serialized message.
pub fn content_fingerprint(serialized_message: &str) -> String {
    let digest = Sha256::digest(serialized_message.as_bytes());
    hex::encode(digest)
}
