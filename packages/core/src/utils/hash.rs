//! Content hashing for reference staleness detection
//!
//! Reference-bearing nodes cache a digest of each dependency's text content
//! and compare it against a freshly computed digest to decide whether their
//! cached output is stale. The only property required of the digest is
//! content equality, not cryptographic strength; SHA-256 is used because it
//! is stable across platforms and collision-resistant enough that equal
//! digests can be treated as equal content.

use sha2::{Digest, Sha256};

/// Sentinel digest for empty content.
///
/// Empty text always hashes to this marker so that "empty vs. empty" never
/// spuriously registers as changed. The sentinel can never collide with a
/// real digest: hex digests are always 64 characters.
pub const EMPTY_CONTENT_HASH: &str = "empty";

/// Compute the content digest of a node's text.
///
/// Deterministic: hashing the same text twice yields identical digests.
pub fn content_hash(text: &str) -> String {
    if text.is_empty() {
        return EMPTY_CONTENT_HASH.to_string();
    }
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = content_hash("let x = 42;");
        let b = content_hash("let x = 42;");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_distinguishes_content() {
        assert_ne!(content_hash("alpha"), content_hash("beta"));
    }

    #[test]
    fn test_empty_content_uses_sentinel() {
        assert_eq!(content_hash(""), EMPTY_CONTENT_HASH);
    }

    #[test]
    fn test_sentinel_never_collides_with_real_digest() {
        // Real digests are 64 hex characters; the sentinel is not.
        let digest = content_hash("anything");
        assert_eq!(digest.len(), 64);
        assert_ne!(digest, EMPTY_CONTENT_HASH);
    }
}
