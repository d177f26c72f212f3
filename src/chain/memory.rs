//! In-memory chain facades.
//!
//! Thread-safe implementations of the [`super`] traits backed by `DashMap`
//! and `parking_lot`. They carry no persistence and no consensus of their
//! own; they exist so the engine can be exercised end-to-end in tests,
//! demos and local simulation without a node around it.

use dashmap::DashMap;
use parking_lot::RwLock;

use super::{
    Accounts, Blockchain, EcBlock, LedgerEvent, PhasingPolls, PrunableEncryptedPayload,
    PrunablePlainPayload, PrunableStore,
};

/// How far behind the tip the economic-cluster block is chosen.
const EC_BLOCK_DISTANCE: i32 = 720;

// ---------------------------------------------------------------------------
// MemoryBlockchain
// ---------------------------------------------------------------------------

/// A chain that is nothing but a height and a height-to-id table.
pub struct MemoryBlockchain {
    height: RwLock<i32>,
    block_ids: DashMap<i32, u64>,
}

impl MemoryBlockchain {
    pub fn new() -> Self {
        let chain = Self {
            height: RwLock::new(0),
            block_ids: DashMap::new(),
        };
        chain.block_ids.insert(0, 1);
        chain
    }

    /// Moves the tip to `height` without registering block ids in between.
    pub fn set_height(&self, height: i32) {
        *self.height.write() = height;
    }

    /// Registers the block id found at `height`.
    pub fn set_block_id(&self, height: i32, id: u64) {
        self.block_ids.insert(height, id);
    }
}

impl Default for MemoryBlockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain for MemoryBlockchain {
    fn height(&self) -> i32 {
        *self.height.read()
    }

    fn ec_block(&self, _timestamp: i32) -> EcBlock {
        let height = (self.height() - EC_BLOCK_DISTANCE).max(0);
        EcBlock {
            height,
            id: self.block_id_at_height(height).unwrap_or(0),
        }
    }

    fn block_id_at_height(&self, height: i32) -> Option<u64> {
        self.block_ids.get(&height).map(|id| *id)
    }
}

// ---------------------------------------------------------------------------
// MemoryLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct AccountEntry {
    public_key: Option<[u8; 32]>,
    balance_nqt: i64,
    unconfirmed_balance_nqt: i64,
    name: String,
    description: String,
}

/// An account ledger held entirely in a concurrent map.
pub struct MemoryLedger {
    accounts: DashMap<u64, AccountEntry>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Creates the account and credits both balances. Test setup helper.
    pub fn fund(&self, account_id: u64, amount_nqt: i64) {
        let mut entry = self.accounts.entry(account_id).or_default();
        entry.balance_nqt += amount_nqt;
        entry.unconfirmed_balance_nqt += amount_nqt;
    }

    /// The stored account-info fields, if the account carries any.
    pub fn account_info(&self, account_id: u64) -> Option<(String, String)> {
        self.accounts
            .get(&account_id)
            .map(|e| (e.name.clone(), e.description.clone()))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Accounts for MemoryLedger {
    fn exists(&self, account_id: u64) -> bool {
        self.accounts.contains_key(&account_id)
    }

    fn add_or_get(&self, account_id: u64) {
        self.accounts.entry(account_id).or_default();
    }

    fn get_public_key(&self, account_id: u64) -> Option<[u8; 32]> {
        self.accounts.get(&account_id).and_then(|e| e.public_key)
    }

    fn set_or_verify(&self, account_id: u64, public_key: &[u8; 32]) -> bool {
        let mut entry = self.accounts.entry(account_id).or_default();
        match entry.public_key {
            None => {
                entry.public_key = Some(*public_key);
                true
            }
            Some(stored) => stored == *public_key,
        }
    }

    fn apply_public_key(&self, account_id: u64, public_key: &[u8; 32]) {
        let mut entry = self.accounts.entry(account_id).or_default();
        if entry.public_key.is_none() {
            entry.public_key = Some(*public_key);
        }
    }

    fn balance_nqt(&self, account_id: u64) -> i64 {
        self.accounts.get(&account_id).map_or(0, |e| e.balance_nqt)
    }

    fn unconfirmed_balance_nqt(&self, account_id: u64) -> i64 {
        self.accounts
            .get(&account_id)
            .map_or(0, |e| e.unconfirmed_balance_nqt)
    }

    fn add_to_balance_nqt(
        &self,
        _event: LedgerEvent,
        _event_id: u64,
        account_id: u64,
        amount_nqt: i64,
        fee_nqt: i64,
    ) {
        let mut entry = self.accounts.entry(account_id).or_default();
        entry.balance_nqt += amount_nqt + fee_nqt;
    }

    fn add_to_unconfirmed_balance_nqt(
        &self,
        _event: LedgerEvent,
        _event_id: u64,
        account_id: u64,
        amount_nqt: i64,
        fee_nqt: i64,
    ) {
        let mut entry = self.accounts.entry(account_id).or_default();
        entry.unconfirmed_balance_nqt += amount_nqt + fee_nqt;
    }

    fn add_to_balance_and_unconfirmed_balance_nqt(
        &self,
        _event: LedgerEvent,
        _event_id: u64,
        account_id: u64,
        amount_nqt: i64,
    ) {
        let mut entry = self.accounts.entry(account_id).or_default();
        entry.balance_nqt += amount_nqt;
        entry.unconfirmed_balance_nqt += amount_nqt;
    }

    fn set_account_info(&self, account_id: u64, name: &str, description: &str) {
        let mut entry = self.accounts.entry(account_id).or_default();
        entry.name = name.to_string();
        entry.description = description.to_string();
    }
}

// ---------------------------------------------------------------------------
// MemoryPhasingPolls
// ---------------------------------------------------------------------------

/// Poll registry backed by a concurrent map of id to finish height.
pub struct MemoryPhasingPolls {
    polls: DashMap<u64, i32>,
}

impl MemoryPhasingPolls {
    pub fn new() -> Self {
        Self {
            polls: DashMap::new(),
        }
    }

    pub fn finish_height(&self, transaction_id: u64) -> Option<i32> {
        self.polls.get(&transaction_id).map(|h| *h)
    }
}

impl Default for MemoryPhasingPolls {
    fn default() -> Self {
        Self::new()
    }
}

impl PhasingPolls for MemoryPhasingPolls {
    fn poll_exists(&self, transaction_id: u64) -> bool {
        self.polls.contains_key(&transaction_id)
    }

    fn create_poll(&self, transaction_id: u64, finish_height: i32) {
        self.polls.insert(transaction_id, finish_height);
    }
}

// ---------------------------------------------------------------------------
// MemoryPrunableStore
// ---------------------------------------------------------------------------

/// Prunable archive backed by concurrent maps. `include_expired` is
/// honored by an explicit expiry mark rather than wall-clock time, which
/// keeps tests deterministic.
pub struct MemoryPrunableStore {
    plain: DashMap<u64, (PrunablePlainPayload, bool)>,
    encrypted: DashMap<u64, (PrunableEncryptedPayload, bool)>,
}

impl MemoryPrunableStore {
    pub fn new() -> Self {
        Self {
            plain: DashMap::new(),
            encrypted: DashMap::new(),
        }
    }

    pub fn store_plain(&self, transaction_id: u64, payload: PrunablePlainPayload, expired: bool) {
        self.plain.insert(transaction_id, (payload, expired));
    }

    pub fn store_encrypted(
        &self,
        transaction_id: u64,
        payload: PrunableEncryptedPayload,
        expired: bool,
    ) {
        self.encrypted.insert(transaction_id, (payload, expired));
    }
}

impl Default for MemoryPrunableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PrunableStore for MemoryPrunableStore {
    fn plain_message(
        &self,
        transaction_id: u64,
        include_expired: bool,
    ) -> Option<PrunablePlainPayload> {
        self.plain.get(&transaction_id).and_then(|entry| {
            let (payload, expired) = entry.value();
            (!expired || include_expired).then(|| payload.clone())
        })
    }

    fn encrypted_message(
        &self,
        transaction_id: u64,
        include_expired: bool,
    ) -> Option<PrunableEncryptedPayload> {
        self.encrypted.get(&transaction_id).and_then(|entry| {
            let (payload, expired) = entry.value();
            (!expired || include_expired).then(|| payload.clone())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
