//! # Signing Keys & Account Identity
//!
//! Curve25519 signing for QBR transactions, exposed as a small facade of
//! free functions. Key material is never an object the rest of the crate
//! holds on to: signing and verification take the secret phrase or the raw
//! public key bytes at the call site, which keeps secrets out of every
//! long-lived structure (and out of every `Debug` impl).
//!
//! ## Secret phrases
//!
//! A QBR identity is a secret phrase. The Ed25519 seed is
//! `SHA-256(phrase)`, so the same phrase deterministically yields the same
//! keypair on every device with no key file to back up or lose. Ed25519
//! signatures themselves are deterministic, which the transaction engine
//! relies on: signing the same unsigned bytes twice must produce the same
//! 64 bytes.
//!
//! ## Account ids
//!
//! An account id is the leading 8 bytes of `SHA-256(public_key)` read as a
//! little-endian `u64`. The id is what appears on the wire and in JSON (as
//! an unsigned decimal string); the public key itself first reaches the
//! ledger when the account signs its first transaction.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;

use super::hash::sha256;

/// Derives the 32-byte public key for a secret phrase.
pub fn public_key(secret_phrase: &str) -> [u8; 32] {
    signing_key(secret_phrase).verifying_key().to_bytes()
}

/// Signs a message with the key derived from the secret phrase.
///
/// Deterministic: the same `(message, secret_phrase)` pair always produces
/// the same 64-byte signature.
pub fn sign(message: &[u8], secret_phrase: &str) -> [u8; 64] {
    signing_key(secret_phrase).sign(message).to_bytes()
}

/// Verifies a 64-byte signature over `message` against a raw public key.
///
/// Malformed public keys and signatures verify as `false`; this function
/// never panics on attacker-controlled input.
pub fn verify(signature: &[u8; 64], message: &[u8], public_key: &[u8; 32]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    key.verify(message, &Signature::from_bytes(signature)).is_ok()
}

/// Derives the account id for a public key: the first 8 bytes of
/// `SHA-256(public_key)`, little-endian.
pub fn account_id(public_key: &[u8; 32]) -> u64 {
    let hash = sha256(public_key);
    u64::from_le_bytes(hash[..8].try_into().expect("slice of length 8"))
}

/// Generates a fresh random secret phrase from the OS RNG, hex-encoded.
///
/// Convenience for tests, demos and throwaway identities. Real wallets
/// derive phrases from proper mnemonic word lists.
pub fn generate_secret_phrase() -> String {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    hex::encode(seed)
}

fn signing_key(secret_phrase: &str) -> SigningKey {
    SigningKey::from_bytes(&sha256(secret_phrase.as_bytes()))
}
