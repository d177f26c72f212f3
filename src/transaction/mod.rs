//! # Transaction Engine
//!
//! The consensus-critical core of the QBR node: the canonical wire form of
//! a transaction, the deterministic codec producing it, the cryptographic
//! identity derived from it, and the validation pipeline that decides
//! whether a transaction may enter the unconfirmed pool and, later,
//! execute against account state.
//!
//! ## Architecture
//!
//! ```text
//! types.rs      — (type, subtype) registry and per-type handlers
//! fee.rs        — fee schedules (constant / size-based)
//! appendix.rs   — the attachment and the seven optional appendages
//! builder.rs    — TransactionBuilder and the immutable Transaction
//! codec.rs      — byte/JSON decoding of untrusted external input
//! validation.rs — validate(), verifySignature, lifecycle hooks, duplicates
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build** — [`TransactionBuilder`] accumulates fields, applies
//!    defaults (timestamp, EC block, fee floor) and produces an immutable
//!    [`Transaction`], signing it when handed a secret phrase.
//! 2. **Decode** — peer bytes and API JSON enter through [`codec`] and end
//!    up in the same builder.
//! 3. **Validate** — [`Transaction::validate`] runs the layered checks;
//!    [`Transaction::verify_signature`] binds the signature to the sender
//!    account.
//! 4. **Pool** — the unconfirmed pool (external) reserves balances through
//!    [`Transaction::apply_unconfirmed`] / [`Transaction::undo_unconfirmed`].
//! 5. **Inclusion** — the block applier fires [`Transaction::apply`] and
//!    attaches the transaction with [`Transaction::set_block`].
//!
//! Every byte of the wire form is consensus-critical; a single ordering or
//! endianness mismatch forks the network. Treat the codec accordingly.

pub mod appendix;
pub mod builder;
pub mod codec;
pub mod fee;
pub mod types;
pub mod validation;

use thiserror::Error;

pub use appendix::{
    Appendix, Attachment, EncryptToSelfMessageAppendix, EncryptedMessageAppendix,
    MessageAppendix, PhasingAppendix, PrunableEncryptedMessageAppendix,
    PrunablePlainMessageAppendix, PublicKeyAnnouncementAppendix,
};
pub use builder::{Transaction, TransactionBuilder};
pub use codec::{parse_bytes, parse_bytes_with_prunables, parse_json, parse_transaction};
pub use fee::Fee;
pub use types::{find_transaction_type, TransactionType, TypeKey};
pub use validation::Duplicates;

/// Rejection of a transaction, in two families with different caller
/// contracts.
///
/// `NotValid` is permanent: malformed bytes, violated invariants, size
/// overflow, double-signing. Drop the transaction; for peer traffic,
/// blacklist the peer. `NotCurrentlyValid` is recoverable: a fee below the
/// current floor, an EC block the chain does not (yet) agree with, a
/// restriction failing at current state. The caller may retry later or
/// resubmit with adjusted fields.
///
/// Programmer errors (reading `id` before signing, serializing a pending
/// encrypted appendage) are not errors of this type: they panic.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Permanently invalid; never admissible on any chain state.
    #[error("invalid transaction: {0}")]
    NotValid(String),

    /// Invalid against current chain state, possibly admissible later.
    #[error("transaction not currently valid: {0}")]
    NotCurrentlyValid(String),
}

impl TransactionError {
    pub(crate) fn not_valid(message: impl Into<String>) -> Self {
        TransactionError::NotValid(message.into())
    }

    pub(crate) fn not_currently_valid(message: impl Into<String>) -> Self {
        TransactionError::NotCurrentlyValid(message.into())
    }

    /// Whether the rejection is permanent. Peer handlers blacklist on
    /// permanent rejections only.
    pub fn is_permanent(&self) -> bool {
        matches!(self, TransactionError::NotValid(_))
    }
}
