//! SHA-256 hashing primitives.
//!
//! The table layer contributes a 32-byte digest of its dirty content to the
//! block root. An untouched table digests to [`ZERO_HASH`], not to the hash
//! of the empty string.

use sha2::{Digest, Sha256};

/// SHA-256 hash output (32 bytes).
pub type Hash = [u8; 32];

/// Zero digest: 32 zero bytes. Returned for tables with no dirty content and
/// used as the default block hash before one is assigned.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Computes the SHA-256 hash of arbitrary data.
#[inline]
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("hello")
        let hash = sha256(b"hello");
        let expected: Hash = [
            0x2c, 0xf2, 0x4d, 0xba, 0x5f, 0xb0, 0xa3, 0x0e, 0x26, 0xe8, 0x3b, 0x2a, 0xc5, 0xb9,
            0xe2, 0x9e, 0x1b, 0x16, 0x1e, 0x5c, 0x1f, 0xa7, 0x42, 0x5e, 0x73, 0x04, 0x33, 0x62,
            0x93, 0x8b, 0x98, 0x24,
        ];
        assert_eq!(hash, expected);
    }

    #[test]
    fn test_empty_input_differs_from_zero() {
        assert_ne!(sha256(&[]), ZERO_HASH);
    }
}
