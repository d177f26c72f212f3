//! # Chain Facades
//!
//! The transaction engine validates against and applies to state it does
//! not own: the blockchain, the account ledger, account restrictions,
//! phasing polls and the prunable-payload archive. Each of those is a trait
//! here, implemented by the node around this crate. The engine itself never
//! performs I/O; every facade call is synchronous and expected to manage
//! its own locking.
//!
//! [`ChainContext`] bundles the facade set together with the per-network
//! `correct_invalid_fees` switch so call sites thread a single reference.
//!
//! [`memory`] provides thread-safe in-memory implementations, which are the
//! substrate for this crate's tests and for local simulation.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::transaction::validation::Duplicates;
use crate::transaction::{Transaction, TransactionError};

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// A block reference returned by the economic-cluster lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcBlock {
    pub height: i32,
    pub id: u64,
}

/// The ledger event category a balance change is booked under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEvent {
    OrdinaryPayment,
    ArbitraryMessage,
    AccountInfo,
}

/// Rehydrated payload of a prunable plain message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrunablePlainPayload {
    pub message: Vec<u8>,
    pub is_text: bool,
}

/// Rehydrated payload of a prunable encrypted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrunableEncryptedPayload {
    pub data: Vec<u8>,
    pub nonce: [u8; 32],
    pub is_text: bool,
    pub is_compressed: bool,
}

// ---------------------------------------------------------------------------
// Facade traits
// ---------------------------------------------------------------------------

/// Read access to the chain the engine validates against.
pub trait Blockchain: Send + Sync {
    /// Current chain height.
    fn height(&self) -> i32;

    /// Resolves the economic-cluster block a transaction created at
    /// `timestamp` should commit to.
    fn ec_block(&self, timestamp: i32) -> EcBlock;

    /// The id of the block at `height`, or `None` beyond the chain tip.
    fn block_id_at_height(&self, height: i32) -> Option<u64>;
}

/// The account ledger surface the engine consumes.
///
/// Balance mutators take the amount and the fee as separate components so
/// the ledger can book them as distinct entries against the same event.
pub trait Accounts: Send + Sync {
    fn exists(&self, account_id: u64) -> bool;

    /// Creates the account if it does not exist yet.
    fn add_or_get(&self, account_id: u64);

    /// The public key bound to the account, once one is known.
    fn get_public_key(&self, account_id: u64) -> Option<[u8; 32]>;

    /// Binds `public_key` to the account on first sight; on later calls
    /// returns whether the stored key matches.
    fn set_or_verify(&self, account_id: u64, public_key: &[u8; 32]) -> bool;

    /// Permanently records the sender key at apply time.
    fn apply_public_key(&self, account_id: u64, public_key: &[u8; 32]);

    fn balance_nqt(&self, account_id: u64) -> i64;
    fn unconfirmed_balance_nqt(&self, account_id: u64) -> i64;

    fn add_to_balance_nqt(
        &self,
        event: LedgerEvent,
        event_id: u64,
        account_id: u64,
        amount_nqt: i64,
        fee_nqt: i64,
    );
    fn add_to_unconfirmed_balance_nqt(
        &self,
        event: LedgerEvent,
        event_id: u64,
        account_id: u64,
        amount_nqt: i64,
        fee_nqt: i64,
    );
    fn add_to_balance_and_unconfirmed_balance_nqt(
        &self,
        event: LedgerEvent,
        event_id: u64,
        account_id: u64,
        amount_nqt: i64,
    );

    /// Stores the account-info attachment fields.
    fn set_account_info(&self, account_id: u64, name: &str, description: &str);
}

/// Account-level policy checks (asset-controlled accounts and the like).
pub trait AccountRestrictions: Send + Sync {
    fn check_transaction(&self, transaction: &Transaction) -> Result<(), TransactionError>;

    fn is_block_duplicate(&self, transaction: &Transaction, duplicates: &mut Duplicates) -> bool;
}

/// The phasing poll registry.
pub trait PhasingPolls: Send + Sync {
    /// Whether a poll exists for the transaction id; selects atFinish
    /// validation mode.
    fn poll_exists(&self, transaction_id: u64) -> bool;

    /// Registers a poll when a phased transaction is applied.
    fn create_poll(&self, transaction_id: u64, finish_height: i32);
}

/// Archive of prunable payloads, keyed by transaction id.
pub trait PrunableStore: Send + Sync {
    fn plain_message(
        &self,
        transaction_id: u64,
        include_expired: bool,
    ) -> Option<PrunablePlainPayload>;

    fn encrypted_message(
        &self,
        transaction_id: u64,
        include_expired: bool,
    ) -> Option<PrunableEncryptedPayload>;
}

// ---------------------------------------------------------------------------
// Default no-op facades
// ---------------------------------------------------------------------------

/// Restrictions policy that allows everything.
pub struct NoRestrictions;

impl AccountRestrictions for NoRestrictions {
    fn check_transaction(&self, _transaction: &Transaction) -> Result<(), TransactionError> {
        Ok(())
    }

    fn is_block_duplicate(&self, _transaction: &Transaction, _duplicates: &mut Duplicates) -> bool {
        false
    }
}

/// Poll registry with no polls; every phased transaction validates in
/// normal mode and poll creation is dropped.
pub struct NoPhasingPolls;

impl PhasingPolls for NoPhasingPolls {
    fn poll_exists(&self, _transaction_id: u64) -> bool {
        false
    }

    fn create_poll(&self, _transaction_id: u64, _finish_height: i32) {}
}

/// Prunable archive that has pruned everything.
pub struct EmptyPrunableStore;

impl PrunableStore for EmptyPrunableStore {
    fn plain_message(&self, _: u64, _: bool) -> Option<PrunablePlainPayload> {
        None
    }

    fn encrypted_message(&self, _: u64, _: bool) -> Option<PrunableEncryptedPayload> {
        None
    }
}

static NO_RESTRICTIONS: NoRestrictions = NoRestrictions;
static NO_POLLS: NoPhasingPolls = NoPhasingPolls;
static NO_PRUNABLES: EmptyPrunableStore = EmptyPrunableStore;

// ---------------------------------------------------------------------------
// ChainContext
// ---------------------------------------------------------------------------

/// The facade bundle threaded through building, validation and the
/// lifecycle hooks.
pub struct ChainContext<'a> {
    pub blockchain: &'a dyn Blockchain,
    pub accounts: &'a dyn Accounts,
    pub restrictions: &'a dyn AccountRestrictions,
    pub phasing: &'a dyn PhasingPolls,
    pub prunables: &'a dyn PrunableStore,

    /// When set, the builder backfills the minimum fee on unsigned
    /// transactions instead of rejecting them later. Signed input is never
    /// rewritten.
    pub correct_invalid_fees: bool,
}

impl<'a> ChainContext<'a> {
    /// A context over the two mandatory facades, with permissive defaults
    /// for the rest.
    pub fn new(blockchain: &'a dyn Blockchain, accounts: &'a dyn Accounts) -> Self {
        Self {
            blockchain,
            accounts,
            restrictions: &NO_RESTRICTIONS,
            phasing: &NO_POLLS,
            prunables: &NO_PRUNABLES,
            correct_invalid_fees: false,
        }
    }

    pub fn with_restrictions(mut self, restrictions: &'a dyn AccountRestrictions) -> Self {
        self.restrictions = restrictions;
        self
    }

    pub fn with_phasing(mut self, phasing: &'a dyn PhasingPolls) -> Self {
        self.phasing = phasing;
        self
    }

    pub fn with_prunables(mut self, prunables: &'a dyn PrunableStore) -> Self {
        self.prunables = prunables;
        self
    }

    pub fn with_correct_invalid_fees(mut self, enabled: bool) -> Self {
        self.correct_invalid_fees = enabled;
        self
    }
}
