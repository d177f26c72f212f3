//! # Transaction & Builder
//!
//! [`TransactionBuilder`] accumulates fields, applies defaults and produces
//! an immutable [`Transaction`], optionally signing it in the same step.
//! The builder is a plain mutable accumulator and is not thread-safe; the
//! built transaction is immutable in every consensus field and freely
//! shareable across threads.
//!
//! ## Canonical bytes
//!
//! The wire form is a fixed little-endian header followed by the attachment
//! and the set appendages in flag-bit order:
//!
//! ```text
//! offset  size  field
//!   0      1    type
//!   1      1    (version << 4) | subtype
//!   2      4    timestamp (i32)
//!   6      2    deadline (i16)
//!   8     32    senderPublicKey
//!  40      8    recipientId (CREATOR_ID when the type has no recipient)
//!  48      8    amountNQT (i64)
//!  56      8    feeNQT (i64)
//!  64     32    referencedTransactionFullHash (zeroed when absent)
//!  96     64    signature (zeroed when absent or for signing)
//! 160      4    flags (i32)        — version >= 1 only
//! 164      4    ecBlockHeight      — version >= 1 only
//! 168      8    ecBlockId          — version >= 1 only
//! 176      …    attachment, then set appendages in flag-bit order
//! ```
//!
//! Signing and identity derivation both consume these bytes with the
//! signature field zeroed, so the serialization is consensus-critical down
//! to the last byte.
//!
//! ## Identity
//!
//! After signing: `fullHash = SHA256(unsignedBytes || SHA256(signature))`,
//! and `id` is the first 8 bytes of `fullHash` as a little-endian `u64`.
//! Reading `id` or `fullHash` on an unsigned transaction is a programmer
//! error and panics.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use parking_lot::RwLock;
use serde_json::Value;

use crate::chain::ChainContext;
use crate::config;
use crate::crypto;

use super::appendix::{
    Appendix, Attachment, EncryptToSelfMessageAppendix, EncryptedMessageAppendix, JsonMap,
    MessageAppendix, PhasingAppendix, PrunableEncryptedMessageAppendix,
    PrunablePlainMessageAppendix, PublicKeyAnnouncementAppendix,
};
use super::types::{TransactionType, TypeKey};
use super::TransactionError;

/// Byte offset of the signature field in the wire form.
pub(crate) const SIGNATURE_OFFSET: usize = 1 + 1 + 4 + 2 + 32 + 8 + 8 + 8 + 32;

/// The minimum fee over a set of appendages at a given height, plus the
/// referenced-hash surcharge. Returns 0 below the baseline height of any
/// appendage, where fees cannot be validated at all.
pub(crate) fn minimum_fee_for(
    appendages: &[&dyn Appendix],
    height: i32,
    has_referenced_hash: bool,
) -> i64 {
    let mut total: i64 = 0;
    for appendage in appendages {
        if height < appendage.baseline_fee_height() {
            return 0;
        }
        let fee = if height >= appendage.next_fee_height() {
            appendage.next_fee()
        } else {
            appendage.baseline_fee()
        };
        total = total.saturating_add(fee.fee_nqt(appendage.full_size()));
    }
    if has_referenced_hash {
        total = total.saturating_add(config::ONE_QBR);
    }
    total
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// Identity fields derived together, once, after signing.
struct TransactionIdentity {
    id: u64,
    string_id: String,
    full_hash: [u8; 32],
}

/// Mutable only while the transaction is attached to or detached from a
/// block; everything consensus-relevant lives outside this struct.
struct BlockLink {
    block_id: u64,
    height: i32,
    block_timestamp: i32,
    index: i16,
}

/// An immutable QBR transaction.
///
/// Produced by [`TransactionBuilder::build`] or
/// [`TransactionBuilder::build_signed`]; parsed off the wire through
/// [`super::codec`]. Consensus fields never change after construction.
/// Lazily derived fields (`bytes`, `id`, `full_hash`, `sender_id`) are
/// computed once and published through atomic cells, so concurrent first
/// readers race only toward identical values.
pub struct Transaction {
    version: u8,
    transaction_type: &'static dyn TransactionType,
    timestamp: i32,
    deadline: i16,
    sender_public_key: OnceLock<[u8; 32]>,
    recipient_id: u64,
    amount_nqt: i64,
    fee_nqt: i64,
    referenced_transaction_full_hash: Option<[u8; 32]>,
    signature: Option<[u8; 64]>,
    ec_block_height: i32,
    ec_block_id: u64,
    attachment: Attachment,
    message: Option<MessageAppendix>,
    encrypted_message: Option<EncryptedMessageAppendix>,
    public_key_announcement: Option<PublicKeyAnnouncementAppendix>,
    encrypt_to_self_message: Option<EncryptToSelfMessageAppendix>,
    phasing: Option<PhasingAppendix>,
    prunable_plain_message: Option<PrunablePlainMessageAppendix>,
    prunable_encrypted_message: Option<PrunableEncryptedMessageAppendix>,
    appendages_size: usize,

    sender_id: OnceLock<u64>,
    identity: OnceLock<TransactionIdentity>,
    bytes: OnceLock<Vec<u8>>,
    valid_signature: AtomicBool,
    link: RwLock<BlockLink>,
}

impl Transaction {
    // -- consensus field accessors ------------------------------------------

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn transaction_type(&self) -> &'static dyn TransactionType {
        self.transaction_type
    }

    pub fn type_key(&self) -> TypeKey {
        self.transaction_type.type_key()
    }

    pub fn timestamp(&self) -> i32 {
        self.timestamp
    }

    pub fn deadline(&self) -> i16 {
        self.deadline
    }

    /// Protocol second at which the transaction expires.
    pub fn expiration(&self) -> i32 {
        self.timestamp + i32::from(self.deadline) * 60
    }

    /// The sender's public key.
    ///
    /// # Panics
    ///
    /// Panics when the key has not been loaded; transactions restored from
    /// a ledger-backed store by sender id must call
    /// [`Transaction::load_sender_public_key`] first.
    pub fn sender_public_key(&self) -> &[u8; 32] {
        self.sender_public_key
            .get()
            .expect("sender public key has not been loaded")
    }

    /// Fetches the sender key from the ledger when the transaction was
    /// constructed with only a sender id.
    pub fn load_sender_public_key(&self, ctx: &ChainContext) {
        if self.sender_public_key.get().is_some() {
            return;
        }
        let sender_id = *self
            .sender_id
            .get()
            .expect("transaction carries neither sender key nor sender id");
        if let Some(key) = ctx.accounts.get_public_key(sender_id) {
            let _ = self.sender_public_key.set(key);
        }
    }

    /// The sender account id, derived from the public key on first access.
    pub fn sender_id(&self) -> u64 {
        *self
            .sender_id
            .get_or_init(|| crypto::account_id(self.sender_public_key()))
    }

    pub fn recipient_id(&self) -> u64 {
        self.recipient_id
    }

    pub fn amount_nqt(&self) -> i64 {
        self.amount_nqt
    }

    pub fn fee_nqt(&self) -> i64 {
        self.fee_nqt
    }

    pub fn referenced_transaction_full_hash(&self) -> Option<&[u8; 32]> {
        self.referenced_transaction_full_hash.as_ref()
    }

    pub fn signature(&self) -> Option<&[u8; 64]> {
        self.signature.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn ec_block_height(&self) -> i32 {
        self.ec_block_height
    }

    pub fn ec_block_id(&self) -> u64 {
        self.ec_block_id
    }

    pub fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    pub fn message(&self) -> Option<&MessageAppendix> {
        self.message.as_ref()
    }

    pub fn encrypted_message(&self) -> Option<&EncryptedMessageAppendix> {
        self.encrypted_message.as_ref()
    }

    pub fn public_key_announcement(&self) -> Option<&PublicKeyAnnouncementAppendix> {
        self.public_key_announcement.as_ref()
    }

    pub fn encrypt_to_self_message(&self) -> Option<&EncryptToSelfMessageAppendix> {
        self.encrypt_to_self_message.as_ref()
    }

    pub fn phasing(&self) -> Option<&PhasingAppendix> {
        self.phasing.as_ref()
    }

    pub fn prunable_plain_message(&self) -> Option<&PrunablePlainMessageAppendix> {
        self.prunable_plain_message.as_ref()
    }

    pub fn prunable_encrypted_message(&self) -> Option<&PrunableEncryptedMessageAppendix> {
        self.prunable_encrypted_message.as_ref()
    }

    /// All appendages in canonical wire order, attachment first.
    pub fn appendages(&self) -> Vec<&dyn Appendix> {
        let mut appendages: Vec<&dyn Appendix> = vec![&self.attachment];
        if let Some(a) = &self.message {
            appendages.push(a);
        }
        if let Some(a) = &self.encrypted_message {
            appendages.push(a);
        }
        if let Some(a) = &self.public_key_announcement {
            appendages.push(a);
        }
        if let Some(a) = &self.encrypt_to_self_message {
            appendages.push(a);
        }
        if let Some(a) = &self.phasing {
            appendages.push(a);
        }
        if let Some(a) = &self.prunable_plain_message {
            appendages.push(a);
        }
        if let Some(a) = &self.prunable_encrypted_message {
            appendages.push(a);
        }
        appendages
    }

    /// Rehydrates every prunable appendage from the archive.
    pub fn load_prunables(&self, ctx: &ChainContext, include_expired: bool) {
        for appendage in self.appendages() {
            appendage.load_prunable(self, ctx, include_expired);
        }
    }

    // -- wire form ----------------------------------------------------------

    /// The flag word announcing which appendages are present.
    pub fn flags(&self) -> i32 {
        let mut flags = 0;
        let mut position = 1;
        for present in [
            self.message.is_some(),
            self.encrypted_message.is_some(),
            self.public_key_announcement.is_some(),
            self.encrypt_to_self_message.is_some(),
            self.phasing.is_some(),
            self.prunable_plain_message.is_some(),
            self.prunable_encrypted_message.is_some(),
        ] {
            if present {
                flags |= position;
            }
            position <<= 1;
        }
        flags
    }

    /// Wire size in bytes.
    pub fn size(&self) -> usize {
        let header = SIGNATURE_OFFSET + 64;
        let versioned = if self.version > 0 { 4 + 4 + 8 } else { 0 };
        header + versioned + self.appendages_size
    }

    /// Size counting prunable payloads carried out of band.
    pub fn full_size(&self) -> usize {
        let mut full_size = self.size() - self.appendages_size;
        for appendage in self.appendages() {
            full_size += appendage.full_size();
        }
        full_size
    }

    /// The canonical signed byte form, computed once.
    pub fn bytes(&self) -> &[u8] {
        self.bytes.get_or_init(|| self.serialize())
    }

    /// The canonical bytes with the signature field zeroed: the signing and
    /// identity preimage.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut data = self.bytes().to_vec();
        zero_signature(&mut data);
        data
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        out.push(self.transaction_type.type_byte());
        out.push((self.version << 4) | self.transaction_type.subtype_byte());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.deadline.to_le_bytes());
        out.extend_from_slice(self.sender_public_key());
        let wire_recipient = if self.transaction_type.can_have_recipient() {
            self.recipient_id
        } else {
            config::CREATOR_ID
        };
        out.extend_from_slice(&wire_recipient.to_le_bytes());
        out.extend_from_slice(&self.amount_nqt.to_le_bytes());
        out.extend_from_slice(&self.fee_nqt.to_le_bytes());
        match &self.referenced_transaction_full_hash {
            Some(hash) => out.extend_from_slice(hash),
            None => out.extend_from_slice(&[0u8; 32]),
        }
        match &self.signature {
            Some(signature) => out.extend_from_slice(signature),
            None => out.extend_from_slice(&[0u8; 64]),
        }
        if self.version > 0 {
            out.extend_from_slice(&self.flags().to_le_bytes());
            out.extend_from_slice(&self.ec_block_height.to_le_bytes());
            out.extend_from_slice(&self.ec_block_id.to_le_bytes());
        }
        for appendage in self.appendages() {
            appendage.put_bytes(&mut out);
        }
        debug_assert_eq!(out.len(), self.size());
        out
    }

    // -- identity -----------------------------------------------------------

    fn identity(&self) -> &TransactionIdentity {
        self.identity.get_or_init(|| {
            let Some(signature) = &self.signature else {
                panic!("transaction is not signed yet");
            };
            let data = self.unsigned_bytes();
            let signature_hash = crypto::sha256(signature.as_slice());
            let full_hash = crypto::sha256_concat(&data, &signature_hash);
            let id = u64::from_le_bytes(full_hash[..8].try_into().expect("8-byte slice"));
            TransactionIdentity {
                id,
                string_id: id.to_string(),
                full_hash,
            }
        })
    }

    /// The transaction id.
    ///
    /// # Panics
    ///
    /// Panics when the transaction is unsigned.
    pub fn id(&self) -> u64 {
        self.identity().id
    }

    /// The id as an unsigned decimal string, the JSON form.
    pub fn string_id(&self) -> &str {
        &self.identity().string_id
    }

    /// The 32-byte full hash.
    ///
    /// # Panics
    ///
    /// Panics when the transaction is unsigned.
    pub fn full_hash(&self) -> &[u8; 32] {
        &self.identity().full_hash
    }

    pub(crate) fn signature_validated(&self) -> bool {
        self.valid_signature.load(Ordering::Acquire)
    }

    pub(crate) fn latch_valid_signature(&self) {
        self.valid_signature.store(true, Ordering::Release);
    }

    // -- block link ---------------------------------------------------------

    /// Height of the containing block, or `i32::MAX` while unconfirmed.
    pub fn height(&self) -> i32 {
        self.link.read().height
    }

    pub fn block_id(&self) -> u64 {
        self.link.read().block_id
    }

    pub fn block_timestamp(&self) -> i32 {
        self.link.read().block_timestamp
    }

    /// Position within the containing block.
    ///
    /// # Panics
    ///
    /// Panics when the index has not been set.
    pub fn index(&self) -> i16 {
        let index = self.link.read().index;
        if index == -1 {
            panic!("transaction index has not been set");
        }
        index
    }

    pub fn set_index(&self, index: i16) {
        self.link.write().index = index;
    }

    pub fn set_height(&self, height: i32) {
        self.link.write().height = height;
    }

    /// Attaches the transaction to a block.
    pub fn set_block(&self, block_id: u64, height: i32, block_timestamp: i32) {
        let mut link = self.link.write();
        link.block_id = block_id;
        link.height = height;
        link.block_timestamp = block_timestamp;
    }

    /// Detaches the transaction on reorg. The height survives so popped
    /// transactions keep their priority when resorted for a new block.
    pub fn unset_block(&self) {
        let mut link = self.link.write();
        link.block_id = 0;
        link.block_timestamp = -1;
        link.index = -1;
    }

    // -- JSON mirror --------------------------------------------------------

    /// The canonical JSON form of the transaction.
    pub fn json_object(&self) -> Value {
        let mut json = JsonMap::new();
        json.insert("type".into(), Value::from(self.transaction_type.type_byte()));
        json.insert(
            "subtype".into(),
            Value::from(self.transaction_type.subtype_byte()),
        );
        json.insert("timestamp".into(), Value::from(self.timestamp));
        json.insert("deadline".into(), Value::from(self.deadline));
        json.insert(
            "senderPublicKey".into(),
            Value::from(hex::encode(self.sender_public_key())),
        );
        if self.transaction_type.can_have_recipient() {
            json.insert("recipient".into(), Value::from(self.recipient_id.to_string()));
        }
        json.insert("amountNQT".into(), Value::from(self.amount_nqt));
        json.insert("feeNQT".into(), Value::from(self.fee_nqt));
        if let Some(hash) = &self.referenced_transaction_full_hash {
            json.insert(
                "referencedTransactionFullHash".into(),
                Value::from(hex::encode(hash)),
            );
        }
        json.insert("ecBlockHeight".into(), Value::from(self.ec_block_height));
        json.insert("ecBlockId".into(), Value::from(self.ec_block_id.to_string()));
        if let Some(signature) = &self.signature {
            json.insert("signature".into(), Value::from(hex::encode(signature)));
        }
        let mut attachment_json = JsonMap::new();
        for appendage in self.appendages() {
            attachment_json.extend(appendage.json());
        }
        if !attachment_json.is_empty() {
            json.insert("attachment".into(), Value::Object(attachment_json));
        }
        json.insert("version".into(), Value::from(self.version));
        Value::Object(json)
    }

    /// The side-channel JSON bag carrying prunable payloads, or `None` when
    /// the transaction has no prunable appendages.
    pub fn prunable_attachment_json(&self) -> Option<Value> {
        let mut json = JsonMap::new();
        if let Some(appendage) = &self.prunable_plain_message {
            json.extend(appendage.json());
        }
        if let Some(appendage) = &self.prunable_encrypted_message {
            json.extend(appendage.json());
        }
        (!json.is_empty()).then_some(Value::Object(json))
    }

    /// The minimum acceptable fee at the given chain height.
    pub fn minimum_fee_nqt(&self, height: i32) -> i64 {
        minimum_fee_for(
            &self.appendages(),
            height,
            self.referenced_transaction_full_hash.is_some(),
        )
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Transaction");
        debug
            .field("type", &self.type_key())
            .field("version", &self.version)
            .field("timestamp", &self.timestamp)
            .field("amount_nqt", &self.amount_nqt)
            .field("fee_nqt", &self.fee_nqt)
            .field("signed", &self.is_signed());
        if self.is_signed() {
            debug.field("id", &self.identity().string_id);
        }
        debug.finish()
    }
}

fn zero_signature(data: &mut [u8]) {
    data[SIGNATURE_OFFSET..SIGNATURE_OFFSET + 64].fill(0);
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Accumulates transaction fields and produces an immutable
/// [`Transaction`].
///
/// Required fields travel through [`TransactionBuilder::new`]; everything
/// else has a sensible default: the timestamp defaults to the current
/// protocol time at build, the EC block is resolved from the chain when not
/// set explicitly, and a non-positive fee is lifted to the minimum fee.
///
/// Not thread-safe; build on one thread, share the result.
pub struct TransactionBuilder {
    version: u8,
    deadline: i16,
    sender_public_key: Option<[u8; 32]>,
    sender_id: u64,
    amount_nqt: i64,
    fee_nqt: i64,
    transaction_type: &'static dyn TransactionType,
    attachment: Attachment,
    recipient_id: u64,
    referenced_transaction_full_hash: Option<[u8; 32]>,
    signature: Option<[u8; 64]>,
    message: Option<MessageAppendix>,
    encrypted_message: Option<EncryptedMessageAppendix>,
    public_key_announcement: Option<PublicKeyAnnouncementAppendix>,
    encrypt_to_self_message: Option<EncryptToSelfMessageAppendix>,
    phasing: Option<PhasingAppendix>,
    prunable_plain_message: Option<PrunablePlainMessageAppendix>,
    prunable_encrypted_message: Option<PrunableEncryptedMessageAppendix>,
    timestamp: Option<i32>,
    ec_block_height: i32,
    ec_block_id: u64,
    ec_block_set: bool,
    height: Option<i32>,
    is_genesis: bool,
}

impl std::fmt::Debug for TransactionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionBuilder")
            .field("version", &self.version)
            .field("deadline", &self.deadline)
            .field("sender_public_key", &self.sender_public_key)
            .field("sender_id", &self.sender_id)
            .field("amount_nqt", &self.amount_nqt)
            .field("fee_nqt", &self.fee_nqt)
            .field("transaction_type", &self.transaction_type.name())
            .field("attachment", &self.attachment)
            .field("recipient_id", &self.recipient_id)
            .field(
                "referenced_transaction_full_hash",
                &self.referenced_transaction_full_hash,
            )
            .field("signature", &self.signature)
            .field("message", &self.message)
            .field("encrypted_message", &self.encrypted_message)
            .field("public_key_announcement", &self.public_key_announcement)
            .field(
                "encrypt_to_self_message",
                &self.encrypt_to_self_message,
            )
            .field("phasing", &self.phasing)
            .field("prunable_plain_message", &self.prunable_plain_message)
            .field(
                "prunable_encrypted_message",
                &self.prunable_encrypted_message,
            )
            .field("timestamp", &self.timestamp)
            .field("ec_block_height", &self.ec_block_height)
            .field("ec_block_id", &self.ec_block_id)
            .field("ec_block_set", &self.ec_block_set)
            .field("height", &self.height)
            .field("is_genesis", &self.is_genesis)
            .finish()
    }
}

impl TransactionBuilder {
    pub fn new(
        version: u8,
        sender_public_key: [u8; 32],
        amount_nqt: i64,
        fee_nqt: i64,
        deadline: i16,
        attachment: Attachment,
    ) -> Self {
        let transaction_type = attachment.transaction_type();
        Self {
            version,
            deadline,
            sender_public_key: Some(sender_public_key),
            sender_id: 0,
            amount_nqt,
            fee_nqt,
            transaction_type,
            attachment,
            recipient_id: 0,
            referenced_transaction_full_hash: None,
            signature: None,
            message: None,
            encrypted_message: None,
            public_key_announcement: None,
            encrypt_to_self_message: None,
            phasing: None,
            prunable_plain_message: None,
            prunable_encrypted_message: None,
            timestamp: None,
            ec_block_height: 0,
            ec_block_id: 0,
            ec_block_set: false,
            height: None,
            is_genesis: false,
        }
    }

    pub fn recipient_id(mut self, recipient_id: u64) -> Self {
        self.recipient_id = recipient_id;
        self
    }

    pub fn referenced_transaction_full_hash(mut self, full_hash: [u8; 32]) -> Self {
        self.referenced_transaction_full_hash = Some(full_hash);
        self
    }

    pub fn timestamp(mut self, timestamp: i32) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn ec_block_height(mut self, height: i32) -> Self {
        self.ec_block_height = height;
        self.ec_block_set = true;
        self
    }

    pub fn ec_block_id(mut self, block_id: u64) -> Self {
        self.ec_block_id = block_id;
        self.ec_block_set = true;
        self
    }

    /// Adopts an existing signature, e.g. one parsed off the wire.
    pub fn signature(mut self, signature: [u8; 64]) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Pins the height used for fee-floor resolution; defaults to the
    /// current chain height.
    pub fn height(mut self, height: i32) -> Self {
        self.height = Some(height);
        self
    }

    /// Marks a genesis transaction: the fee is taken verbatim and the
    /// zero-timestamp sentinel rules apply.
    pub fn genesis(mut self) -> Self {
        self.is_genesis = true;
        self
    }

    pub fn message(mut self, message: MessageAppendix) -> Self {
        self.message = Some(message);
        self
    }

    pub fn encrypted_message(mut self, encrypted_message: EncryptedMessageAppendix) -> Self {
        self.encrypted_message = Some(encrypted_message);
        self
    }

    pub fn public_key_announcement(
        mut self,
        announcement: PublicKeyAnnouncementAppendix,
    ) -> Self {
        self.public_key_announcement = Some(announcement);
        self
    }

    pub fn encrypt_to_self_message(
        mut self,
        encrypt_to_self_message: EncryptToSelfMessageAppendix,
    ) -> Self {
        self.encrypt_to_self_message = Some(encrypt_to_self_message);
        self
    }

    pub fn phasing(mut self, phasing: PhasingAppendix) -> Self {
        self.phasing = Some(phasing);
        self
    }

    pub fn prunable_plain_message(
        mut self,
        prunable_plain_message: PrunablePlainMessageAppendix,
    ) -> Self {
        self.prunable_plain_message = Some(prunable_plain_message);
        self
    }

    pub fn prunable_encrypted_message(
        mut self,
        prunable_encrypted_message: PrunableEncryptedMessageAppendix,
    ) -> Self {
        self.prunable_encrypted_message = Some(prunable_encrypted_message);
        self
    }

    /// Builds an unsigned transaction, or one carrying an adopted
    /// signature.
    pub fn build(self, ctx: &ChainContext) -> Result<Transaction, TransactionError> {
        self.build_inner(ctx, None)
    }

    /// Builds and signs in one step.
    ///
    /// Fails with `NotValid` when a signature was already supplied, or when
    /// the secret phrase does not derive the builder's sender public key.
    pub fn build_signed(
        self,
        ctx: &ChainContext,
        secret_phrase: &str,
    ) -> Result<Transaction, TransactionError> {
        self.build_inner(ctx, Some(secret_phrase))
    }

    fn build_inner(
        mut self,
        ctx: &ChainContext,
        secret_phrase: Option<&str>,
    ) -> Result<Transaction, TransactionError> {
        if self.signature.is_some() && secret_phrase.is_some() {
            return Err(TransactionError::not_valid("transaction is already signed"));
        }

        let timestamp = self.timestamp.unwrap_or_else(config::epoch_time);
        if !self.ec_block_set && self.version > 0 {
            let ec_block = ctx.blockchain.ec_block(timestamp);
            self.ec_block_height = ec_block.height;
            self.ec_block_id = ec_block.id;
        }

        if let Some(phrase) = secret_phrase {
            if let Some(encrypted_message) = &mut self.encrypted_message {
                encrypted_message.encrypt(phrase);
            }
            if let Some(encrypt_to_self) = &mut self.encrypt_to_self_message {
                encrypt_to_self.encrypt(phrase);
            }
        } else if self
            .encrypted_message
            .as_ref()
            .is_some_and(EncryptedMessageAppendix::is_pending)
            || self
                .encrypt_to_self_message
                .as_ref()
                .is_some_and(EncryptToSelfMessageAppendix::is_pending)
        {
            return Err(TransactionError::not_valid(
                "pending encrypted appendages require building with a secret phrase",
            ));
        }

        let fee_nqt = if self.is_genesis {
            self.fee_nqt
        } else if self.fee_nqt <= 0 || (ctx.correct_invalid_fees && self.signature.is_none()) {
            let effective_height = self.height.unwrap_or_else(|| ctx.blockchain.height());
            let appendages = self.appendage_views();
            let minimum_fee = minimum_fee_for(
                &appendages,
                effective_height,
                self.referenced_transaction_full_hash.is_some(),
            );
            minimum_fee.max(self.fee_nqt)
        } else {
            self.fee_nqt
        };

        let appendages_size: usize = self
            .appendage_views()
            .iter()
            .map(|appendage| appendage.size())
            .sum();

        let sender_public_key = OnceLock::new();
        if let Some(key) = self.sender_public_key {
            let _ = sender_public_key.set(key);
        }
        let sender_id = OnceLock::new();
        if self.sender_id != 0 {
            let _ = sender_id.set(self.sender_id);
        }

        let transaction = Transaction {
            version: self.version,
            transaction_type: self.transaction_type,
            timestamp,
            deadline: self.deadline,
            sender_public_key,
            recipient_id: self.recipient_id,
            amount_nqt: self.amount_nqt,
            fee_nqt,
            referenced_transaction_full_hash: self.referenced_transaction_full_hash,
            signature: self.signature,
            ec_block_height: self.ec_block_height,
            ec_block_id: self.ec_block_id,
            attachment: self.attachment,
            message: self.message,
            encrypted_message: self.encrypted_message,
            public_key_announcement: self.public_key_announcement,
            encrypt_to_self_message: self.encrypt_to_self_message,
            phasing: self.phasing,
            prunable_plain_message: self.prunable_plain_message,
            prunable_encrypted_message: self.prunable_encrypted_message,
            appendages_size,
            sender_id,
            identity: OnceLock::new(),
            bytes: OnceLock::new(),
            valid_signature: AtomicBool::new(false),
            link: RwLock::new(BlockLink {
                block_id: 0,
                height: self.height.unwrap_or(i32::MAX),
                block_timestamp: -1,
                index: -1,
            }),
        };

        let Some(phrase) = secret_phrase else {
            return Ok(transaction);
        };

        let derived_key = crypto::public_key(phrase);
        if *transaction.sender_public_key() != derived_key {
            return Err(TransactionError::not_valid(
                "secret phrase does not match transaction sender public key",
            ));
        }
        let signature = crypto::sign(transaction.bytes(), phrase);
        Ok(transaction.with_signature(signature))
    }

    fn appendage_views(&self) -> Vec<&dyn Appendix> {
        let mut views: Vec<&dyn Appendix> = vec![&self.attachment];
        if let Some(a) = &self.message {
            views.push(a);
        }
        if let Some(a) = &self.encrypted_message {
            views.push(a);
        }
        if let Some(a) = &self.public_key_announcement {
            views.push(a);
        }
        if let Some(a) = &self.encrypt_to_self_message {
            views.push(a);
        }
        if let Some(a) = &self.phasing {
            views.push(a);
        }
        if let Some(a) = &self.prunable_plain_message {
            views.push(a);
        }
        if let Some(a) = &self.prunable_encrypted_message {
            views.push(a);
        }
        views
    }

    /// Restores a transaction from a ledger-backed store that persists only
    /// the sender id; the public key is fetched lazily through
    /// [`Transaction::load_sender_public_key`].
    pub fn sender_id(mut self, sender_id: u64) -> Self {
        self.sender_id = sender_id;
        self.sender_public_key = None;
        self
    }
}

impl Transaction {
    /// Seals a freshly built transaction with its signature. The byte and
    /// identity caches are reset: the cached bytes were the signing
    /// preimage with a zeroed signature field.
    fn with_signature(mut self, signature: [u8; 64]) -> Self {
        self.signature = Some(signature);
        self.bytes = OnceLock::new();
        self.identity = OnceLock::new();
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
