//! Cryptographic utilities for content hashing.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 hash of raw bytes and returns it as a hex string.
pub fn sha256_hex_bytes(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Error produced when a value cannot be serialized for hashing.
#[derive(Debug, thiserror::Error)]
#[error("Failed to serialize value for hashing: {0}")]
pub struct HashError(#[from] serde_json::Error);

/// Computes a deterministic content hash of any serializable value.
///
/// The value is serialized to JSON and hashed with SHA-256. Used to derive
/// opaque keys (refresh tokens) from structured payloads.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String, HashError> {
    let serialized = serde_json::to_string(value)?;
    Ok(sha256_hex(&serialized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_empty_string() {
        let hash = sha256_hex("");
        assert_eq!(hash.len(), 64);
        // SHA256 of empty string
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hex_deterministic() {
        let hash1 = sha256_hex("same_input");
        let hash2 = sha256_hex("same_input");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_sha256_hex_different_inputs() {
        assert_ne!(sha256_hex("input1"), sha256_hex("input2"));
    }

    #[test]
    fn test_sha256_hex_bytes_matches_str() {
        assert_eq!(sha256_hex("abc"), sha256_hex_bytes(b"abc"));
    }

    #[test]
    fn test_content_hash_deterministic() {
        let user = json!({"id": 7, "email": "user@example.com"});

        let hash1 = content_hash(&user).unwrap();
        let hash2 = content_hash(&user).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_content_hash_differs_per_value() {
        let a = content_hash(&json!({"id": 1})).unwrap();
        let b = content_hash(&json!({"id": 2})).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_content_hash_of_string_matches_json_form() {
        // Strings serialize with quotes, so the hash covers the JSON form.
        let hashed = content_hash(&"abc").unwrap();
        assert_eq!(hashed, sha256_hex("\"abc\""));
    }

    #[test]
    fn test_sha256_hex_unicode() {
        let hash = sha256_hex("你好世界");
        assert_eq!(hash.len(), 64);
    }
}
