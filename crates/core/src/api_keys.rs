//! API key generation and hashing.
//!
//! Keys are compared by SHA-256 digest so the configured plaintext is
//! never compared byte-by-byte against request input.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of the generated API key string (alphanumeric characters).
pub const KEY_LENGTH: usize = 43;

/// Generate a new random alphanumeric API key.
pub fn generate_api_key() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest of a plaintext key.
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Check a presented key against the stored digest.
pub fn verify_api_key(presented: &str, expected_hash: &str) -> bool {
    hash_api_key(presented) == expected_hash
}
