//! SHA-256 helpers.
//!
//! Only used to fingerprint audit payloads, so a stored audit row can be
//! matched against a request body without keeping the body itself around
//! in more places than necessary.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `input` followed by `secret`.
///
/// An empty `secret` yields the plain digest of `input`.
pub fn sha256_hex(input: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
