//! # Protocol Configuration & Consensus Constants
//!
//! Every magic number in QBR lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! All of these values are consensus-critical: two nodes that disagree on
//! any of them will disagree on which transactions are valid, and a network
//! that disagrees on validity is two networks. Changing anything below after
//! mainnet launch is somewhere between "hard fork" and "career-ending".

use chrono::{TimeZone, Utc};

// ---------------------------------------------------------------------------
// Monetary units
// ---------------------------------------------------------------------------

/// Ticker symbol of the native coin, used in fee diagnostics.
pub const COIN_SYMBOL: &str = "QBR";

/// NQT per whole coin. All protocol arithmetic is integer NQT; the decimal
/// point is a display-layer fiction.
pub const ONE_QBR: i64 = 100_000_000;

/// Total coin supply in whole coins.
pub const MAX_BALANCE_QBR: i64 = 1_000_000_000;

/// Total coin supply in NQT. No balance, amount or fee may exceed this.
pub const MAX_BALANCE_QNT: i64 = MAX_BALANCE_QBR * ONE_QBR;

/// Deposit reserved against the sender's unconfirmed balance while a
/// transaction referencing another transaction's full hash sits in the
/// pool. Refunded when the transaction is included in a block.
pub const UNCONFIRMED_POOL_DEPOSIT_QNT: i64 = 100 * ONE_QBR;

// ---------------------------------------------------------------------------
// Transaction limits
// ---------------------------------------------------------------------------

/// Maximum number of transactions in one block.
pub const MAX_NUMBER_OF_TRANSACTIONS: usize = 255;

/// Size of a version-1 transaction with an empty attachment and no
/// appendages: the fixed header alone.
pub const MIN_TRANSACTION_SIZE: usize = 176;

/// Upper bound on the full size of a single transaction, and on the byte
/// payload of a block.
pub const MAX_PAYLOAD_LENGTH: usize = MAX_NUMBER_OF_TRANSACTIONS * MIN_TRANSACTION_SIZE;

/// Maximum transaction deadline, in minutes (one day).
pub const MAX_DEADLINE: i16 = 1440;

/// Maximum length of a plain (non-prunable) arbitrary message, in bytes.
pub const MAX_ARBITRARY_MESSAGE_LENGTH: usize = 160;

/// Maximum length of the opaque ciphertext of an encrypted message
/// appendage, in bytes, nonce excluded.
pub const MAX_ENCRYPTED_MESSAGE_LENGTH: usize = 1024;

/// Maximum length of a prunable plain message, in bytes. Prunable payloads
/// never enter the permanent block payload, so the cap is generous.
pub const MAX_PRUNABLE_MESSAGE_LENGTH: usize = 42 * 1024;

/// Maximum lengths for the account-info attachment fields.
pub const MAX_ACCOUNT_NAME_LENGTH: usize = 100;
pub const MAX_ACCOUNT_DESCRIPTION_LENGTH: usize = 1000;

// ---------------------------------------------------------------------------
// Phasing
// ---------------------------------------------------------------------------

/// Maximum number of blocks between acceptance and finish of a phased
/// transaction (14 days at one block per minute).
pub const MAX_PHASING_DURATION: i32 = 14 * 1440;

/// Maximum number of whitelisted voter accounts on a phasing appendage.
pub const MAX_PHASING_WHITELIST_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// Prunables
// ---------------------------------------------------------------------------

/// Minimum time, in epoch seconds, that prunable payloads must remain
/// available before archival nodes may drop them.
pub const MIN_PRUNABLE_LIFETIME: i32 = 14 * 1440 * 60;

// ---------------------------------------------------------------------------
// Fee schedule activation
// ---------------------------------------------------------------------------

/// Height at which the baseline fee schedule takes effect. Transactions
/// cannot be fee-validated below the baseline height of any appendage they
/// carry.
pub const BASELINE_FEE_HEIGHT: i32 = 1;

/// Height at which the next fee schedule takes effect. `i32::MAX` means no
/// schedule change is currently announced.
pub const NEXT_FEE_HEIGHT: i32 = i32::MAX;

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// Account id of the genesis creator. On the wire this id stands in for the
/// recipient field of transaction types that cannot have a recipient.
pub const CREATOR_ID: u64 = 5_629_144_612_334_787_213;

// ---------------------------------------------------------------------------
// Protocol epoch
// ---------------------------------------------------------------------------

/// Seconds of the protocol epoch (2024-05-01T00:00:00Z) since the Unix
/// epoch. Transaction timestamps count seconds from this instant, which
/// keeps them comfortably inside an `i32` for the next few decades.
pub const EPOCH_BEGINNING_UNIX: i64 = 1_714_521_600;

/// Returns the current protocol time: seconds elapsed since the protocol
/// epoch. Used as the default transaction timestamp at build time.
pub fn epoch_time() -> i32 {
    (Utc::now().timestamp() - EPOCH_BEGINNING_UNIX) as i32
}

/// Converts a protocol timestamp back to a `chrono` instant. Display-layer
/// helper; consensus code never needs it.
pub fn from_epoch_time(timestamp: i32) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(EPOCH_BEGINNING_UNIX + i64::from(timestamp), 0)
        .single()
        .expect("epoch timestamp within chrono range")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
