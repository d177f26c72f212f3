//! # Hashing
//!
//! SHA-256, and nothing else. Transaction identity, account identity and
//! signature binding all hash with SHA-256, and every one of those digests
//! is consensus-critical: a node that hashes differently computes different
//! transaction ids and lives on its own network.
//!
//! The helpers below return fixed-size arrays rather than `Vec<u8>` because
//! every consumer in this crate wants exactly 32 bytes and the type system
//! may as well say so.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of the input.
///
/// # Example
///
/// ```
/// use qbr_protocol::crypto::sha256;
///
/// let digest = sha256(b"QBR protocol");
/// assert_eq!(digest.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the SHA-256 digest of two concatenated inputs without
/// materializing the concatenation.
///
/// This is the shape of the transaction full-hash derivation, which digests
/// the unsigned bytes followed by the hash of the signature.
pub fn sha256_concat(first: &[u8], second: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(first);
    hasher.update(second);
    hasher.finalize().into()
}
