//! # Cryptographic Primitives
//!
//! The crypto facade consumed by the transaction engine: SHA-256 hashing,
//! Curve25519 signing keyed by secret phrase, account-id derivation, and
//! the X25519 + AES-256-GCM construction behind encrypted message
//! appendages. Don't roll your own; everything here wraps audited crates.

pub mod encryption;
pub mod hash;
pub mod keys;

pub use encryption::{decrypt_from, encrypt_to, exchange_public_key, EncryptedData};
pub use hash::{sha256, sha256_concat};
pub use keys::{account_id, generate_secret_phrase, public_key, sign, verify};
