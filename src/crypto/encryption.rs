//! # Encrypted Message Payloads
//!
//! X25519 key agreement plus AES-256-GCM for the encrypted message
//! appendages. Consensus only sees the resulting opaque bytes; this module
//! exists so that wallets built on this crate can produce and open those
//! payloads without inventing their own construction.
//!
//! The exchange key is derived from the same secret phrase as the signing
//! key, but on the Montgomery form of the curve, so a phrase is one
//! identity for both signing and key agreement.
//!
//! Construction: a fresh 32-byte salt is drawn per message; the AES key is
//! `SHA-256(x25519_shared_secret XOR salt)`; the GCM nonce is derived from
//! the salt. The salt travels on the wire next to the ciphertext, so either
//! party to the exchange can re-derive the key.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

use super::hash::{sha256, sha256_concat};

/// An encrypted payload as it appears inside an appendage: the AES-GCM
/// ciphertext (tag included) and the 32-byte key-derivation salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// Ciphertext, authentication tag appended by GCM.
    pub data: Vec<u8>,
    /// Per-message key-derivation salt, public by design.
    pub nonce: [u8; 32],
}

/// Derives the X25519 exchange public key for a secret phrase.
pub fn exchange_public_key(secret_phrase: &str) -> [u8; 32] {
    PublicKey::from(&exchange_secret(secret_phrase)).to_bytes()
}

/// Encrypts `plaintext` from the phrase holder to the owner of
/// `their_exchange_key`.
pub fn encrypt_to(
    plaintext: &[u8],
    secret_phrase: &str,
    their_exchange_key: &[u8; 32],
) -> EncryptedData {
    let mut nonce = [0u8; 32];
    OsRng.fill_bytes(&mut nonce);
    let cipher = derive_cipher(secret_phrase, their_exchange_key, &nonce);
    let data = cipher
        .encrypt(Nonce::from_slice(&gcm_iv(&nonce)), plaintext)
        .expect("AES-GCM encryption is infallible for in-memory buffers");
    EncryptedData { data, nonce }
}

/// Decrypts a payload produced by [`encrypt_to`]. Either side of the
/// exchange can open it; X25519 agreement is symmetric.
///
/// Returns `None` when the ciphertext fails authentication, which covers
/// both tampering and a wrong key.
pub fn decrypt_from(
    encrypted: &EncryptedData,
    secret_phrase: &str,
    their_exchange_key: &[u8; 32],
) -> Option<Vec<u8>> {
    let cipher = derive_cipher(secret_phrase, their_exchange_key, &encrypted.nonce);
    cipher
        .decrypt(Nonce::from_slice(&gcm_iv(&encrypted.nonce)), encrypted.data.as_ref())
        .ok()
}

/// Size in bytes of the ciphertext produced for a plaintext of `len` bytes:
/// the plaintext plus the 16-byte GCM tag.
pub const fn encrypted_size(len: usize) -> usize {
    len + 16
}

fn exchange_secret(secret_phrase: &str) -> StaticSecret {
    StaticSecret::from(sha256(secret_phrase.as_bytes()))
}

fn derive_cipher(secret_phrase: &str, their_key: &[u8; 32], nonce: &[u8; 32]) -> Aes256Gcm {
    let shared = exchange_secret(secret_phrase)
        .diffie_hellman(&PublicKey::from(*their_key));
    let mut seed = *shared.as_bytes();
    for (byte, salt) in seed.iter_mut().zip(nonce) {
        *byte ^= salt;
    }
    let key = sha256(&seed);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key))
}

fn gcm_iv(nonce: &[u8; 32]) -> [u8; 12] {
    let digest = sha256_concat(nonce, b"qbr-gcm-iv");
    digest[..12].try_into().expect("slice of length 12")
}
