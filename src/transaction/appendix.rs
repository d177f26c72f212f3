//! # Appendages
//!
//! Optional, self-delimited sections riding after a transaction's
//! attachment, plus the attachment itself. Every appendage implements the
//! [`Appendix`] capability set: it knows its own wire version, sizes,
//! serialization, JSON shape, fee contribution, validation rules and apply
//! behavior. The transaction header announces which appendages are present
//! through a flag word, and the wire order of appendages is exactly the
//! ascending order of their flag bits:
//!
//! | bit    | appendage                     |
//! |--------|-------------------------------|
//! | `0x01` | plain message                 |
//! | `0x02` | encrypted message             |
//! | `0x04` | public-key announcement       |
//! | `0x08` | encrypt-to-self message       |
//! | `0x10` | phasing                       |
//! | `0x20` | prunable plain message        |
//! | `0x40` | prunable encrypted message    |
//!
//! Two cross-cutting behaviors:
//!
//! - **Encryptable** appendages (encrypted message, encrypt-to-self) may be
//!   created with pending plaintext; the builder encrypts them when it is
//!   handed a secret phrase, before any serialization.
//! - **Prunable** appendages put only a 32-byte payload hash on the wire.
//!   The payload itself travels through a side-channel JSON bag and may be
//!   dropped from archival storage after its lifetime; `load_prunable`
//!   rehydrates it on demand.
//!
//! Version-1+ transactions prefix each appendage (empty attachments
//! excepted) with a one-byte appendage version; version-0 transactions
//! carry no version bytes and support only the legacy implicit message.

use std::sync::OnceLock;

use serde_json::{Map, Value};

use crate::chain::{ChainContext, PrunableEncryptedPayload, PrunablePlainPayload};
use crate::config;
use crate::crypto::{self, EncryptedData};

use super::codec::{self, ByteReader};
use super::fee::Fee;
use super::types::{self, TransactionType};
use super::{Transaction, TransactionError};

pub(crate) type JsonMap = Map<String, Value>;

// ---------------------------------------------------------------------------
// The capability set
// ---------------------------------------------------------------------------

/// Shared capability set of every appendage, the attachment included.
pub trait Appendix {
    /// Name used in the `version.<Name>` JSON marker.
    fn appendix_name(&self) -> &'static str;

    /// Appendage version byte; 0 means no version byte on the wire.
    fn version(&self) -> u8;

    /// Wire size of the payload, version byte excluded.
    fn my_size(&self) -> usize;

    /// Wire size including the version byte.
    fn size(&self) -> usize {
        self.my_size() + usize::from(self.version() > 0)
    }

    /// Payload size counting externally carried prunable content.
    fn my_full_size(&self) -> usize {
        self.my_size()
    }

    /// Full size including the version byte.
    fn full_size(&self) -> usize {
        self.my_full_size() + usize::from(self.version() > 0)
    }

    /// Serializes the payload, version byte excluded.
    fn put_my_bytes(&self, out: &mut Vec<u8>);

    /// Serializes the appendage in its on-wire form.
    fn put_bytes(&self, out: &mut Vec<u8>) {
        if self.version() > 0 {
            out.push(self.version());
        }
        self.put_my_bytes(out);
    }

    /// JSON fields of the payload, version marker excluded.
    fn my_json(&self) -> JsonMap;

    /// Canonical JSON form including the version marker.
    fn json(&self) -> JsonMap {
        let mut json = self.my_json();
        if self.version() > 0 {
            json.insert(
                format!("version.{}", self.appendix_name()),
                Value::from(self.version()),
            );
        }
        json
    }

    /// Whether this appendage's version is acceptable on a transaction of
    /// the given version.
    fn verify_version(&self, transaction_version: u8) -> bool {
        self.version() == u8::from(transaction_version != 0)
    }

    /// Height from which this appendage can be fee-validated at all.
    fn baseline_fee_height(&self) -> i32 {
        config::BASELINE_FEE_HEIGHT
    }

    fn next_fee_height(&self) -> i32 {
        config::NEXT_FEE_HEIGHT
    }

    fn baseline_fee(&self) -> Fee {
        Fee::NONE
    }

    fn next_fee(&self) -> Fee {
        self.baseline_fee()
    }

    /// Whether this appendage's effect can be deferred by phasing.
    fn is_phasable(&self) -> bool {
        true
    }

    /// Whether this appendage's effect is deferred on this transaction.
    fn is_phased(&self, transaction: &Transaction) -> bool {
        self.is_phasable() && transaction.phasing().is_some()
    }

    fn validate(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
    ) -> Result<(), TransactionError>;

    /// Validation at phasing finish height. Appendages whose effects are
    /// not deferred have nothing left to check.
    fn validate_at_finish(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        if !self.is_phased(transaction) {
            return Ok(());
        }
        self.validate(transaction, ctx)
    }

    fn apply(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
        sender_id: u64,
        recipient_id: Option<u64>,
    );

    /// Rehydrates a prunable payload from the archive. No-op for
    /// non-prunable appendages.
    fn load_prunable(
        &self,
        _transaction: &Transaction,
        _ctx: &ChainContext,
        _include_expired: bool,
    ) {
    }
}

/// Encodes a payload length with the text flag in the sign bit.
fn flagged_length(len: usize, is_text: bool) -> i32 {
    let length = len as i32;
    if is_text {
        length | i32::MIN
    } else {
        length
    }
}

/// Decodes a flagged length; returns `(length, is_text)`.
fn read_flagged_length(reader: &mut ByteReader) -> Result<(usize, bool), TransactionError> {
    let raw = reader.read_i32()?;
    Ok(((raw & i32::MAX) as usize, raw < 0))
}

fn message_to_json(message: &[u8], is_text: bool) -> Value {
    if is_text {
        Value::from(String::from_utf8_lossy(message).into_owned())
    } else {
        Value::from(hex::encode(message))
    }
}

fn message_from_json(value: &str, is_text: bool) -> Result<Vec<u8>, TransactionError> {
    if is_text {
        Ok(value.as_bytes().to_vec())
    } else {
        hex::decode(value)
            .map_err(|_| TransactionError::not_valid("invalid hex message in attachment"))
    }
}

// ---------------------------------------------------------------------------
// Plain message — flag 0x01
// ---------------------------------------------------------------------------

/// An unencrypted message riding with the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAppendix {
    version: u8,
    message: Vec<u8>,
    is_text: bool,
}

impl MessageAppendix {
    pub fn text(message: &str) -> Self {
        Self {
            version: 1,
            message: message.as_bytes().to_vec(),
            is_text: true,
        }
    }

    pub fn binary(message: Vec<u8>) -> Self {
        Self {
            version: 1,
            message,
            is_text: false,
        }
    }

    /// The legacy version-0 wire form, which carries no appendage version
    /// byte. Only version-0 arbitrary-message transactions use it.
    pub fn legacy_text(message: &str) -> Self {
        Self {
            version: 0,
            message: message.as_bytes().to_vec(),
            is_text: true,
        }
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    pub fn is_text(&self) -> bool {
        self.is_text
    }

    pub(crate) fn parse(
        reader: &mut ByteReader,
        transaction_version: u8,
    ) -> Result<Self, TransactionError> {
        let version = if transaction_version == 0 {
            0
        } else {
            reader.read_u8()?
        };
        let (length, is_text) = read_flagged_length(reader)?;
        if length > config::MAX_ARBITRARY_MESSAGE_LENGTH {
            return Err(TransactionError::not_valid(format!(
                "message length {length} exceeds maximum"
            )));
        }
        Ok(Self {
            version,
            message: reader.read_bytes(length)?,
            is_text,
        })
    }

    pub(crate) fn from_json(attachment: &JsonMap) -> Result<Option<Self>, TransactionError> {
        // "message" also names the prunable plain payload; the prunable
        // version marker or hash disambiguates.
        if attachment.contains_key("version.PrunablePlainMessage")
            || attachment.contains_key("messageHash")
        {
            return Ok(None);
        }
        let Some(message) = attachment.get("message").and_then(Value::as_str) else {
            return Ok(None);
        };
        let is_text = codec::bool_field(attachment, "messageIsText", true);
        Ok(Some(Self {
            version: codec::appendix_version(attachment, "Message"),
            message: message_from_json(message, is_text)?,
            is_text,
        }))
    }
}

impl Appendix for MessageAppendix {
    fn appendix_name(&self) -> &'static str {
        "Message"
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn my_size(&self) -> usize {
        4 + self.message.len()
    }

    fn put_my_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&flagged_length(self.message.len(), self.is_text).to_le_bytes());
        out.extend_from_slice(&self.message);
    }

    fn my_json(&self) -> JsonMap {
        let mut json = JsonMap::new();
        json.insert(
            "message".into(),
            message_to_json(&self.message, self.is_text),
        );
        json.insert("messageIsText".into(), Value::from(self.is_text));
        json
    }

    fn baseline_fee(&self) -> Fee {
        Fee::SizeBased {
            constant_fee: 0,
            fee_per_unit: config::ONE_QBR,
            unit_size: 32,
        }
    }

    fn validate(
        &self,
        transaction: &Transaction,
        _ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        if transaction.version() == 0
            && transaction.type_key() != types::ARBITRARY_MESSAGE_KEY
        {
            return Err(TransactionError::not_valid(
                "message appendages not enabled for version 0 transactions of this type",
            ));
        }
        if self.message.len() > config::MAX_ARBITRARY_MESSAGE_LENGTH {
            return Err(TransactionError::not_valid(format!(
                "invalid message length {}",
                self.message.len()
            )));
        }
        if transaction.prunable_plain_message().is_some() {
            return Err(TransactionError::not_valid(
                "cannot have both a message and a prunable message",
            ));
        }
        Ok(())
    }

    fn apply(&self, _: &Transaction, _: &ChainContext, _: u64, _: Option<u64>) {}
}

// ---------------------------------------------------------------------------
// Encrypted envelopes — shared core of flags 0x02 and 0x08
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum EncryptedState {
    /// Ciphertext ready for the wire.
    Encrypted(EncryptedData),
    /// Plaintext awaiting `encrypt` during a secret-phrase build.
    Pending {
        plaintext: Vec<u8>,
        recipient_exchange_key: Option<[u8; 32]>,
    },
}

/// Shared wire/JSON/encryption logic of the two encrypted appendages.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EncryptedEnvelope {
    state: EncryptedState,
    is_text: bool,
    is_compressed: bool,
}

impl EncryptedEnvelope {
    /// Appendage version doubles as the compression marker: 1 compressed,
    /// 2 raw.
    fn version(&self) -> u8 {
        if self.is_compressed {
            1
        } else {
            2
        }
    }

    fn data_len(&self) -> usize {
        match &self.state {
            EncryptedState::Encrypted(data) => data.data.len(),
            EncryptedState::Pending { plaintext, .. } => {
                crypto::encryption::encrypted_size(plaintext.len())
            }
        }
    }

    fn my_size(&self) -> usize {
        4 + self.data_len() + 32
    }

    fn put_my_bytes(&self, out: &mut Vec<u8>) {
        let EncryptedState::Encrypted(data) = &self.state else {
            panic!("encrypted message appendage serialized before encryption");
        };
        out.extend_from_slice(&flagged_length(data.data.len(), self.is_text).to_le_bytes());
        out.extend_from_slice(&data.data);
        out.extend_from_slice(&data.nonce);
    }

    fn json_value(&self) -> Value {
        match &self.state {
            EncryptedState::Encrypted(data) => serde_json::json!({
                "data": hex::encode(&data.data),
                "nonce": hex::encode(data.nonce),
                "isText": self.is_text,
                "isCompressed": self.is_compressed,
            }),
            EncryptedState::Pending { plaintext, .. } => serde_json::json!({
                "messageToEncrypt": message_to_json(plaintext, self.is_text),
                "isText": self.is_text,
            }),
        }
    }

    fn parse(reader: &mut ByteReader, version: u8) -> Result<Self, TransactionError> {
        let (length, is_text) = read_flagged_length(reader)?;
        if length > config::MAX_ENCRYPTED_MESSAGE_LENGTH {
            return Err(TransactionError::not_valid(format!(
                "encrypted message length {length} exceeds maximum"
            )));
        }
        let data = reader.read_bytes(length)?;
        let nonce = reader.read_array::<32>()?;
        Ok(Self {
            state: EncryptedState::Encrypted(EncryptedData { data, nonce }),
            is_text,
            is_compressed: version == 1,
        })
    }

    fn from_json(object: &JsonMap) -> Result<Self, TransactionError> {
        let data = hex::decode(codec::str_field(object, "data")?)
            .map_err(|_| TransactionError::not_valid("invalid encrypted data hex"))?;
        if data.len() > config::MAX_ENCRYPTED_MESSAGE_LENGTH {
            return Err(TransactionError::not_valid(
                "encrypted message length exceeds maximum",
            ));
        }
        let nonce_bytes = hex::decode(codec::str_field(object, "nonce")?)
            .map_err(|_| TransactionError::not_valid("invalid encrypted nonce hex"))?;
        let nonce: [u8; 32] = nonce_bytes
            .try_into()
            .map_err(|_| TransactionError::not_valid("encrypted nonce must be 32 bytes"))?;
        Ok(Self {
            state: EncryptedState::Encrypted(EncryptedData { data, nonce }),
            is_text: codec::bool_field(object, "isText", false),
            is_compressed: codec::bool_field(object, "isCompressed", true),
        })
    }

    /// Turns pending plaintext into ciphertext. `fallback_key` supplies the
    /// recipient key for envelopes encrypted to the sender.
    fn encrypt(&mut self, secret_phrase: &str, fallback_key: Option<[u8; 32]>) {
        if let EncryptedState::Pending {
            plaintext,
            recipient_exchange_key,
        } = &self.state
        {
            let their_key = recipient_exchange_key
                .or(fallback_key)
                .expect("pending envelope without a recipient exchange key");
            let encrypted = crypto::encrypt_to(plaintext, secret_phrase, &their_key);
            self.state = EncryptedState::Encrypted(encrypted);
        }
    }

    fn is_pending(&self) -> bool {
        matches!(self.state, EncryptedState::Pending { .. })
    }

    fn encrypted_data(&self) -> Option<&EncryptedData> {
        match &self.state {
            EncryptedState::Encrypted(data) => Some(data),
            EncryptedState::Pending { .. } => None,
        }
    }

    fn validate_length(&self) -> Result<(), TransactionError> {
        if self.data_len() > config::MAX_ENCRYPTED_MESSAGE_LENGTH {
            return Err(TransactionError::not_valid(format!(
                "encrypted message length {} exceeds maximum",
                self.data_len()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Encrypted message — flag 0x02
// ---------------------------------------------------------------------------

/// A message encrypted to the transaction's recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedMessageAppendix {
    envelope: EncryptedEnvelope,
}

impl EncryptedMessageAppendix {
    /// Wraps ciphertext produced elsewhere (typically by the recipient's
    /// wallet through [`crate::crypto::encrypt_to`]).
    pub fn encrypted(data: EncryptedData, is_text: bool, is_compressed: bool) -> Self {
        Self {
            envelope: EncryptedEnvelope {
                state: EncryptedState::Encrypted(data),
                is_text,
                is_compressed,
            },
        }
    }

    /// Defers encryption to the build step; requires building with the
    /// sender's secret phrase.
    pub fn pending(plaintext: Vec<u8>, recipient_exchange_key: [u8; 32], is_text: bool) -> Self {
        Self {
            envelope: EncryptedEnvelope {
                state: EncryptedState::Pending {
                    plaintext,
                    recipient_exchange_key: Some(recipient_exchange_key),
                },
                is_text,
                is_compressed: false,
            },
        }
    }

    pub fn encrypted_data(&self) -> Option<&EncryptedData> {
        self.envelope.encrypted_data()
    }

    pub fn is_text(&self) -> bool {
        self.envelope.is_text
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.envelope.is_pending()
    }

    pub(crate) fn encrypt(&mut self, secret_phrase: &str) {
        self.envelope.encrypt(secret_phrase, None);
    }

    pub(crate) fn parse(
        reader: &mut ByteReader,
        transaction_version: u8,
    ) -> Result<Self, TransactionError> {
        let version = if transaction_version == 0 {
            0
        } else {
            reader.read_u8()?
        };
        Ok(Self {
            envelope: EncryptedEnvelope::parse(reader, version)?,
        })
    }

    pub(crate) fn from_json(attachment: &JsonMap) -> Result<Option<Self>, TransactionError> {
        // The prunable variant reuses the "encryptedMessage" object; its
        // version marker claims it.
        if attachment.contains_key("version.PrunableEncryptedMessage")
            || attachment.contains_key("encryptedMessageHash")
        {
            return Ok(None);
        }
        let Some(object) = attachment.get("encryptedMessage").and_then(Value::as_object) else {
            return Ok(None);
        };
        Ok(Some(Self {
            envelope: EncryptedEnvelope::from_json(object)?,
        }))
    }
}

impl Appendix for EncryptedMessageAppendix {
    fn appendix_name(&self) -> &'static str {
        "EncryptedMessage"
    }

    fn version(&self) -> u8 {
        self.envelope.version()
    }

    fn my_size(&self) -> usize {
        self.envelope.my_size()
    }

    fn put_my_bytes(&self, out: &mut Vec<u8>) {
        self.envelope.put_my_bytes(out);
    }

    fn my_json(&self) -> JsonMap {
        let mut json = JsonMap::new();
        json.insert("encryptedMessage".into(), self.envelope.json_value());
        json
    }

    fn verify_version(&self, transaction_version: u8) -> bool {
        if transaction_version == 0 {
            return false;
        }
        self.version() == 1 || self.version() == 2
    }

    fn baseline_fee(&self) -> Fee {
        Fee::SizeBased {
            constant_fee: 0,
            fee_per_unit: config::ONE_QBR,
            unit_size: 32,
        }
    }

    fn validate(
        &self,
        transaction: &Transaction,
        _ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        if !transaction.transaction_type().can_have_recipient()
            || transaction.recipient_id() == 0
        {
            return Err(TransactionError::not_valid(
                "encrypted messages require a transaction with a recipient",
            ));
        }
        if transaction.prunable_encrypted_message().is_some() {
            return Err(TransactionError::not_valid(
                "cannot have both an encrypted message and a prunable encrypted message",
            ));
        }
        self.envelope.validate_length()
    }

    fn apply(&self, _: &Transaction, _: &ChainContext, _: u64, _: Option<u64>) {}
}

// ---------------------------------------------------------------------------
// Public-key announcement — flag 0x04
// ---------------------------------------------------------------------------

/// Announces the recipient account's public key so the ledger can bind it
/// before the recipient has ever signed anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyAnnouncementAppendix {
    version: u8,
    public_key: [u8; 32],
}

impl PublicKeyAnnouncementAppendix {
    pub fn new(public_key: [u8; 32]) -> Self {
        Self {
            version: 1,
            public_key,
        }
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    pub(crate) fn parse(
        reader: &mut ByteReader,
        transaction_version: u8,
    ) -> Result<Self, TransactionError> {
        let version = if transaction_version == 0 {
            0
        } else {
            reader.read_u8()?
        };
        Ok(Self {
            version,
            public_key: reader.read_array::<32>()?,
        })
    }

    pub(crate) fn from_json(attachment: &JsonMap) -> Result<Option<Self>, TransactionError> {
        let Some(key_hex) = attachment.get("recipientPublicKey").and_then(Value::as_str) else {
            return Ok(None);
        };
        let bytes = hex::decode(key_hex)
            .map_err(|_| TransactionError::not_valid("invalid recipient public key hex"))?;
        let public_key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TransactionError::not_valid("recipient public key must be 32 bytes"))?;
        Ok(Some(Self {
            version: codec::appendix_version(attachment, "PublicKeyAnnouncement"),
            public_key,
        }))
    }
}

impl Appendix for PublicKeyAnnouncementAppendix {
    fn appendix_name(&self) -> &'static str {
        "PublicKeyAnnouncement"
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn my_size(&self) -> usize {
        32
    }

    fn put_my_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.public_key);
    }

    fn my_json(&self) -> JsonMap {
        let mut json = JsonMap::new();
        json.insert(
            "recipientPublicKey".into(),
            Value::from(hex::encode(self.public_key)),
        );
        json
    }

    fn validate(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        if !transaction.transaction_type().can_have_recipient()
            || transaction.recipient_id() == 0
        {
            return Err(TransactionError::not_valid(
                "public key announcements require a transaction with a recipient",
            ));
        }
        let recipient_id = transaction.recipient_id();
        if crypto::account_id(&self.public_key) != recipient_id {
            return Err(TransactionError::not_valid(
                "announced public key does not match the recipient account",
            ));
        }
        if let Some(stored) = ctx.accounts.get_public_key(recipient_id) {
            if stored != self.public_key {
                return Err(TransactionError::not_currently_valid(
                    "recipient account already has a different public key",
                ));
            }
        }
        Ok(())
    }

    fn apply(
        &self,
        _transaction: &Transaction,
        ctx: &ChainContext,
        _sender_id: u64,
        recipient_id: Option<u64>,
    ) {
        if let Some(recipient_id) = recipient_id {
            ctx.accounts.set_or_verify(recipient_id, &self.public_key);
        }
    }
}

// ---------------------------------------------------------------------------
// Encrypt-to-self message — flag 0x08
// ---------------------------------------------------------------------------

/// A note the sender encrypts to their own exchange key, typically used by
/// wallets to attach private bookkeeping to an outgoing payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptToSelfMessageAppendix {
    envelope: EncryptedEnvelope,
}

impl EncryptToSelfMessageAppendix {
    pub fn encrypted(data: EncryptedData, is_text: bool, is_compressed: bool) -> Self {
        Self {
            envelope: EncryptedEnvelope {
                state: EncryptedState::Encrypted(data),
                is_text,
                is_compressed,
            },
        }
    }

    /// Defers encryption to the build step; the recipient key is the
    /// sender's own, derived from the signing phrase.
    pub fn pending(plaintext: Vec<u8>, is_text: bool) -> Self {
        Self {
            envelope: EncryptedEnvelope {
                state: EncryptedState::Pending {
                    plaintext,
                    recipient_exchange_key: None,
                },
                is_text,
                is_compressed: false,
            },
        }
    }

    pub fn encrypted_data(&self) -> Option<&EncryptedData> {
        self.envelope.encrypted_data()
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.envelope.is_pending()
    }

    pub(crate) fn encrypt(&mut self, secret_phrase: &str) {
        let own_key = crypto::exchange_public_key(secret_phrase);
        self.envelope.encrypt(secret_phrase, Some(own_key));
    }

    pub(crate) fn parse(
        reader: &mut ByteReader,
        transaction_version: u8,
    ) -> Result<Self, TransactionError> {
        let version = if transaction_version == 0 {
            0
        } else {
            reader.read_u8()?
        };
        Ok(Self {
            envelope: EncryptedEnvelope::parse(reader, version)?,
        })
    }

    pub(crate) fn from_json(attachment: &JsonMap) -> Result<Option<Self>, TransactionError> {
        let Some(object) = attachment
            .get("encryptToSelfMessage")
            .and_then(Value::as_object)
        else {
            return Ok(None);
        };
        Ok(Some(Self {
            envelope: EncryptedEnvelope::from_json(object)?,
        }))
    }
}

impl Appendix for EncryptToSelfMessageAppendix {
    fn appendix_name(&self) -> &'static str {
        "EncryptToSelfMessage"
    }

    fn version(&self) -> u8 {
        self.envelope.version()
    }

    fn my_size(&self) -> usize {
        self.envelope.my_size()
    }

    fn put_my_bytes(&self, out: &mut Vec<u8>) {
        self.envelope.put_my_bytes(out);
    }

    fn my_json(&self) -> JsonMap {
        let mut json = JsonMap::new();
        json.insert("encryptToSelfMessage".into(), self.envelope.json_value());
        json
    }

    fn verify_version(&self, transaction_version: u8) -> bool {
        if transaction_version == 0 {
            return false;
        }
        self.version() == 1 || self.version() == 2
    }

    fn baseline_fee(&self) -> Fee {
        Fee::SizeBased {
            constant_fee: 0,
            fee_per_unit: config::ONE_QBR,
            unit_size: 32,
        }
    }

    fn validate(
        &self,
        _transaction: &Transaction,
        _ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        self.envelope.validate_length()
    }

    fn apply(&self, _: &Transaction, _: &ChainContext, _: u64, _: Option<u64>) {}
}

// ---------------------------------------------------------------------------
// Phasing — flag 0x10
// ---------------------------------------------------------------------------

/// Votes are counted one per whitelisted account.
pub const VOTING_MODEL_ACCOUNT: i8 = 0;
/// Votes are weighted by voter balance.
pub const VOTING_MODEL_BALANCE: i8 = 1;

/// Marks the transaction as conditionally executed: the fee is charged at
/// inclusion, the attachment's effects wait for the poll at
/// `finish_height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasingAppendix {
    version: u8,
    finish_height: i32,
    voting_model: i8,
    quorum: i64,
    min_balance: i64,
    whitelist: Vec<u64>,
}

impl PhasingAppendix {
    pub fn new(
        finish_height: i32,
        voting_model: i8,
        quorum: i64,
        min_balance: i64,
        whitelist: Vec<u64>,
    ) -> Self {
        Self {
            version: 1,
            finish_height,
            voting_model,
            quorum,
            min_balance,
            whitelist,
        }
    }

    pub fn finish_height(&self) -> i32 {
        self.finish_height
    }

    pub fn quorum(&self) -> i64 {
        self.quorum
    }

    pub fn whitelist(&self) -> &[u64] {
        &self.whitelist
    }

    pub(crate) fn parse(
        reader: &mut ByteReader,
        transaction_version: u8,
    ) -> Result<Self, TransactionError> {
        let version = if transaction_version == 0 {
            0
        } else {
            reader.read_u8()?
        };
        let finish_height = reader.read_i32()?;
        let voting_model = reader.read_u8()? as i8;
        let quorum = reader.read_i64()?;
        let min_balance = reader.read_i64()?;
        let whitelist_size = reader.read_u8()? as usize;
        if whitelist_size > config::MAX_PHASING_WHITELIST_SIZE {
            return Err(TransactionError::not_valid(format!(
                "phasing whitelist size {whitelist_size} exceeds maximum"
            )));
        }
        let mut whitelist = Vec::with_capacity(whitelist_size);
        for _ in 0..whitelist_size {
            whitelist.push(reader.read_u64()?);
        }
        Ok(Self {
            version,
            finish_height,
            voting_model,
            quorum,
            min_balance,
            whitelist,
        })
    }

    pub(crate) fn from_json(attachment: &JsonMap) -> Result<Option<Self>, TransactionError> {
        let Some(finish_height) = attachment.get("phasingFinishHeight") else {
            return Ok(None);
        };
        let finish_height = finish_height
            .as_i64()
            .ok_or_else(|| TransactionError::not_valid("invalid phasingFinishHeight"))?
            as i32;
        let whitelist = match attachment.get("phasingWhitelist").and_then(Value::as_array) {
            Some(entries) => entries
                .iter()
                .map(|entry| codec::unsigned_id(entry))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(Some(Self {
            version: codec::appendix_version(attachment, "Phasing"),
            finish_height,
            voting_model: codec::i64_field(attachment, "phasingVotingModel")? as i8,
            quorum: codec::i64_field(attachment, "phasingQuorum")?,
            min_balance: codec::i64_field(attachment, "phasingMinBalance").unwrap_or(0),
            whitelist,
        }))
    }

    fn validate_params(&self) -> Result<(), TransactionError> {
        if self.voting_model != VOTING_MODEL_ACCOUNT && self.voting_model != VOTING_MODEL_BALANCE {
            return Err(TransactionError::not_valid(format!(
                "invalid phasing voting model {}",
                self.voting_model
            )));
        }
        if self.whitelist.len() > config::MAX_PHASING_WHITELIST_SIZE {
            return Err(TransactionError::not_valid("phasing whitelist too large"));
        }
        let mut seen = self.whitelist.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.whitelist.len() {
            return Err(TransactionError::not_valid(
                "duplicate accounts in phasing whitelist",
            ));
        }
        if self.quorum <= 0 {
            return Err(TransactionError::not_valid("phasing quorum must be positive"));
        }
        if self.voting_model == VOTING_MODEL_ACCOUNT
            && !self.whitelist.is_empty()
            && self.quorum > self.whitelist.len() as i64
        {
            return Err(TransactionError::not_valid(
                "phasing quorum exceeds whitelist size",
            ));
        }
        if self.min_balance < 0 || self.min_balance > config::MAX_BALANCE_QNT {
            return Err(TransactionError::not_valid("invalid phasing minimum balance"));
        }
        Ok(())
    }
}

impl Appendix for PhasingAppendix {
    fn appendix_name(&self) -> &'static str {
        "Phasing"
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn my_size(&self) -> usize {
        4 + 1 + 8 + 8 + 1 + 8 * self.whitelist.len()
    }

    fn put_my_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.finish_height.to_le_bytes());
        out.push(self.voting_model as u8);
        out.extend_from_slice(&self.quorum.to_le_bytes());
        out.extend_from_slice(&self.min_balance.to_le_bytes());
        out.push(self.whitelist.len() as u8);
        for account_id in &self.whitelist {
            out.extend_from_slice(&account_id.to_le_bytes());
        }
    }

    fn my_json(&self) -> JsonMap {
        let mut json = JsonMap::new();
        json.insert("phasingFinishHeight".into(), Value::from(self.finish_height));
        json.insert("phasingVotingModel".into(), Value::from(self.voting_model));
        json.insert("phasingQuorum".into(), Value::from(self.quorum));
        json.insert("phasingMinBalance".into(), Value::from(self.min_balance));
        json.insert(
            "phasingWhitelist".into(),
            Value::from(
                self.whitelist
                    .iter()
                    .map(|id| Value::from(id.to_string()))
                    .collect::<Vec<_>>(),
            ),
        );
        json
    }

    fn baseline_fee(&self) -> Fee {
        Fee::Constant(config::ONE_QBR)
    }

    fn is_phasable(&self) -> bool {
        false
    }

    fn validate(
        &self,
        _transaction: &Transaction,
        ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        self.validate_params()?;
        let current_height = ctx.blockchain.height();
        if self.finish_height <= current_height {
            return Err(TransactionError::not_currently_valid(format!(
                "phasing finish height {} must be after current height {current_height}",
                self.finish_height
            )));
        }
        if self.finish_height > current_height + config::MAX_PHASING_DURATION {
            return Err(TransactionError::not_currently_valid(format!(
                "phasing finish height {} too far in the future",
                self.finish_height
            )));
        }
        Ok(())
    }

    fn validate_at_finish(
        &self,
        _transaction: &Transaction,
        _ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        // The height window was checked at acceptance; only the structural
        // parameters still matter at finish.
        self.validate_params()
    }

    fn apply(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
        _sender_id: u64,
        _recipient_id: Option<u64>,
    ) {
        ctx.phasing.create_poll(transaction.id(), self.finish_height);
    }
}

// ---------------------------------------------------------------------------
// Prunable plain message — flag 0x20
// ---------------------------------------------------------------------------

/// A message whose payload lives outside the permanent block payload. Only
/// its 32-byte hash is consensus data; archival nodes may drop the payload
/// after [`config::MIN_PRUNABLE_LIFETIME`].
#[derive(Debug)]
pub struct PrunablePlainMessageAppendix {
    version: u8,
    hash: Option<[u8; 32]>,
    payload: OnceLock<PrunablePlainPayload>,
}

impl PrunablePlainMessageAppendix {
    pub fn text(message: &str) -> Self {
        Self::with_payload(PrunablePlainPayload {
            message: message.as_bytes().to_vec(),
            is_text: true,
        })
    }

    pub fn binary(message: Vec<u8>) -> Self {
        Self::with_payload(PrunablePlainPayload {
            message,
            is_text: false,
        })
    }

    /// The legacy version-0 wire form, which carries no appendage version
    /// byte. Only version-0 transactions use it.
    pub fn legacy_text(message: &str) -> Self {
        Self {
            version: 0,
            ..Self::with_payload(PrunablePlainPayload {
                message: message.as_bytes().to_vec(),
                is_text: true,
            })
        }
    }

    fn with_payload(payload: PrunablePlainPayload) -> Self {
        let cell = OnceLock::new();
        cell.set(payload).expect("fresh cell");
        Self {
            version: 1,
            hash: None,
            payload: cell,
        }
    }

    pub fn payload(&self) -> Option<&PrunablePlainPayload> {
        self.payload.get()
    }

    /// The consensus hash: over the payload when present, otherwise the
    /// hash carried on the wire.
    pub fn hash(&self) -> [u8; 32] {
        if let Some(payload) = self.payload.get() {
            return hash_plain_payload(payload);
        }
        self.hash.expect("pruned appendage always carries its hash")
    }

    pub(crate) fn parse(
        reader: &mut ByteReader,
        transaction_version: u8,
    ) -> Result<Self, TransactionError> {
        let version = if transaction_version == 0 {
            0
        } else {
            reader.read_u8()?
        };
        Ok(Self {
            version,
            hash: Some(reader.read_array::<32>()?),
            payload: OnceLock::new(),
        })
    }

    pub(crate) fn from_json(attachment: &JsonMap) -> Result<Option<Self>, TransactionError> {
        if !attachment.contains_key("version.PrunablePlainMessage")
            && !attachment.contains_key("messageHash")
        {
            return Ok(None);
        }
        let hash = match attachment.get("messageHash").and_then(Value::as_str) {
            Some(hash_hex) => Some(
                hex::decode(hash_hex)
                    .ok()
                    .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
                    .ok_or_else(|| TransactionError::not_valid("invalid message hash"))?,
            ),
            None => None,
        };
        let payload = OnceLock::new();
        if let Some(message) = attachment.get("message").and_then(Value::as_str) {
            let is_text = codec::bool_field(attachment, "messageIsText", true);
            payload
                .set(PrunablePlainPayload {
                    message: message_from_json(message, is_text)?,
                    is_text,
                })
                .expect("fresh cell");
        } else if hash.is_none() {
            return Err(TransactionError::not_valid(
                "prunable message carries neither payload nor hash",
            ));
        }
        Ok(Some(Self {
            version: codec::appendix_version(attachment, "PrunablePlainMessage"),
            hash,
            payload,
        }))
    }
}

fn hash_plain_payload(payload: &PrunablePlainPayload) -> [u8; 32] {
    crypto::sha256_concat(&[u8::from(payload.is_text)], &payload.message)
}

impl Appendix for PrunablePlainMessageAppendix {
    fn appendix_name(&self) -> &'static str {
        "PrunablePlainMessage"
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn my_size(&self) -> usize {
        32
    }

    fn my_full_size(&self) -> usize {
        self.payload.get().map_or(0, |p| p.message.len())
    }

    fn put_my_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.hash());
    }

    fn my_json(&self) -> JsonMap {
        let mut json = JsonMap::new();
        match self.payload.get() {
            Some(payload) => {
                json.insert(
                    "message".into(),
                    message_to_json(&payload.message, payload.is_text),
                );
                json.insert("messageIsText".into(), Value::from(payload.is_text));
            }
            None => {
                json.insert("messageHash".into(), Value::from(hex::encode(self.hash())));
            }
        }
        json
    }

    fn baseline_fee(&self) -> Fee {
        Fee::SizeBased {
            constant_fee: 0,
            fee_per_unit: config::ONE_QBR / 10,
            unit_size: 1024,
        }
    }

    fn is_phasable(&self) -> bool {
        false
    }

    fn validate(
        &self,
        transaction: &Transaction,
        _ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        if transaction.message().is_some() {
            return Err(TransactionError::not_valid(
                "cannot have both a message and a prunable message",
            ));
        }
        match self.payload.get() {
            Some(payload) => {
                if payload.message.len() > config::MAX_PRUNABLE_MESSAGE_LENGTH {
                    return Err(TransactionError::not_valid(format!(
                        "invalid prunable message length {}",
                        payload.message.len()
                    )));
                }
                if let Some(declared) = self.hash {
                    if declared != hash_plain_payload(payload) {
                        return Err(TransactionError::not_valid(
                            "prunable message hash does not match its payload",
                        ));
                    }
                }
                Ok(())
            }
            None => {
                if config::epoch_time() - transaction.timestamp()
                    < config::MIN_PRUNABLE_LIFETIME
                {
                    return Err(TransactionError::not_currently_valid(
                        "prunable message payload not available",
                    ));
                }
                Ok(())
            }
        }
    }

    fn apply(&self, _: &Transaction, _: &ChainContext, _: u64, _: Option<u64>) {}

    fn load_prunable(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
        include_expired: bool,
    ) {
        if self.payload.get().is_some() || !transaction.is_signed() {
            return;
        }
        if let Some(payload) = ctx
            .prunables
            .plain_message(transaction.id(), include_expired)
        {
            let _ = self.payload.set(payload);
        }
    }
}

// ---------------------------------------------------------------------------
// Prunable encrypted message — flag 0x40
// ---------------------------------------------------------------------------

/// The encrypted counterpart of the prunable plain message: a 32-byte hash
/// on the wire, ciphertext in the side channel.
#[derive(Debug)]
pub struct PrunableEncryptedMessageAppendix {
    version: u8,
    hash: Option<[u8; 32]>,
    payload: OnceLock<PrunableEncryptedPayload>,
}

impl PrunableEncryptedMessageAppendix {
    pub fn new(data: EncryptedData, is_text: bool, is_compressed: bool) -> Self {
        let cell = OnceLock::new();
        cell.set(PrunableEncryptedPayload {
            data: data.data,
            nonce: data.nonce,
            is_text,
            is_compressed,
        })
        .expect("fresh cell");
        Self {
            version: 1,
            hash: None,
            payload: cell,
        }
    }

    /// The legacy version-0 wire form, which carries no appendage version
    /// byte. Only version-0 transactions use it.
    pub fn legacy(data: EncryptedData, is_text: bool, is_compressed: bool) -> Self {
        Self {
            version: 0,
            ..Self::new(data, is_text, is_compressed)
        }
    }

    pub fn payload(&self) -> Option<&PrunableEncryptedPayload> {
        self.payload.get()
    }

    pub fn hash(&self) -> [u8; 32] {
        if let Some(payload) = self.payload.get() {
            return hash_encrypted_payload(payload);
        }
        self.hash.expect("pruned appendage always carries its hash")
    }

    pub(crate) fn parse(
        reader: &mut ByteReader,
        transaction_version: u8,
    ) -> Result<Self, TransactionError> {
        let version = if transaction_version == 0 {
            0
        } else {
            reader.read_u8()?
        };
        Ok(Self {
            version,
            hash: Some(reader.read_array::<32>()?),
            payload: OnceLock::new(),
        })
    }

    pub(crate) fn from_json(attachment: &JsonMap) -> Result<Option<Self>, TransactionError> {
        if !attachment.contains_key("version.PrunableEncryptedMessage")
            && !attachment.contains_key("encryptedMessageHash")
        {
            return Ok(None);
        }
        let hash = match attachment.get("encryptedMessageHash").and_then(Value::as_str) {
            Some(hash_hex) => Some(
                hex::decode(hash_hex)
                    .ok()
                    .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
                    .ok_or_else(|| {
                        TransactionError::not_valid("invalid encrypted message hash")
                    })?,
            ),
            None => None,
        };
        let payload = OnceLock::new();
        if let Some(object) = attachment.get("encryptedMessage").and_then(Value::as_object) {
            let envelope = EncryptedEnvelope::from_json(object)?;
            let data = envelope
                .encrypted_data()
                .expect("JSON envelopes are always encrypted")
                .clone();
            payload
                .set(PrunableEncryptedPayload {
                    data: data.data,
                    nonce: data.nonce,
                    is_text: envelope.is_text,
                    is_compressed: envelope.is_compressed,
                })
                .expect("fresh cell");
        } else if hash.is_none() {
            return Err(TransactionError::not_valid(
                "prunable encrypted message carries neither payload nor hash",
            ));
        }
        Ok(Some(Self {
            version: codec::appendix_version(attachment, "PrunableEncryptedMessage"),
            hash,
            payload,
        }))
    }
}

fn hash_encrypted_payload(payload: &PrunableEncryptedPayload) -> [u8; 32] {
    let mut preimage =
        Vec::with_capacity(2 + payload.data.len() + payload.nonce.len());
    preimage.push(u8::from(payload.is_text));
    preimage.push(u8::from(payload.is_compressed));
    preimage.extend_from_slice(&payload.data);
    preimage.extend_from_slice(&payload.nonce);
    crypto::sha256(&preimage)
}

impl Appendix for PrunableEncryptedMessageAppendix {
    fn appendix_name(&self) -> &'static str {
        "PrunableEncryptedMessage"
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn my_size(&self) -> usize {
        32
    }

    fn my_full_size(&self) -> usize {
        self.payload.get().map_or(0, |p| 4 + p.data.len() + 32)
    }

    fn put_my_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.hash());
    }

    fn my_json(&self) -> JsonMap {
        let mut json = JsonMap::new();
        match self.payload.get() {
            Some(payload) => {
                json.insert(
                    "encryptedMessage".into(),
                    serde_json::json!({
                        "data": hex::encode(&payload.data),
                        "nonce": hex::encode(payload.nonce),
                        "isText": payload.is_text,
                        "isCompressed": payload.is_compressed,
                    }),
                );
            }
            None => {
                json.insert(
                    "encryptedMessageHash".into(),
                    Value::from(hex::encode(self.hash())),
                );
            }
        }
        json
    }

    fn baseline_fee(&self) -> Fee {
        Fee::SizeBased {
            constant_fee: 0,
            fee_per_unit: config::ONE_QBR / 10,
            unit_size: 1024,
        }
    }

    fn is_phasable(&self) -> bool {
        false
    }

    fn validate(
        &self,
        transaction: &Transaction,
        _ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        if transaction.encrypted_message().is_some() {
            return Err(TransactionError::not_valid(
                "cannot have both an encrypted message and a prunable encrypted message",
            ));
        }
        match self.payload.get() {
            Some(payload) => {
                if payload.data.len() > config::MAX_PRUNABLE_MESSAGE_LENGTH {
                    return Err(TransactionError::not_valid(format!(
                        "invalid prunable encrypted message length {}",
                        payload.data.len()
                    )));
                }
                if let Some(declared) = self.hash {
                    if declared != hash_encrypted_payload(payload) {
                        return Err(TransactionError::not_valid(
                            "prunable encrypted message hash does not match its payload",
                        ));
                    }
                }
                Ok(())
            }
            None => {
                if config::epoch_time() - transaction.timestamp()
                    < config::MIN_PRUNABLE_LIFETIME
                {
                    return Err(TransactionError::not_currently_valid(
                        "prunable encrypted message payload not available",
                    ));
                }
                Ok(())
            }
        }
    }

    fn apply(&self, _: &Transaction, _: &ChainContext, _: u64, _: Option<u64>) {}

    fn load_prunable(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
        include_expired: bool,
    ) {
        if self.payload.get().is_some() || !transaction.is_signed() {
            return;
        }
        if let Some(payload) = ctx
            .prunables
            .encrypted_message(transaction.id(), include_expired)
        {
            let _ = self.payload.set(payload);
        }
    }
}

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

/// The mandatory type-specific payload, always first among the appendages.
///
/// Which variant a transaction carries is what decides its `(type, subtype)`
/// pair; [`Attachment::transaction_type`] is the authoritative mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    OrdinaryPayment,
    ArbitraryMessage,
    AccountInfo { name: String, description: String },
}

impl Attachment {
    pub fn transaction_type(&self) -> &'static dyn TransactionType {
        match self {
            Attachment::OrdinaryPayment => types::find_transaction_type(0, 0),
            Attachment::ArbitraryMessage => types::find_transaction_type(1, 0),
            Attachment::AccountInfo { .. } => types::find_transaction_type(1, 5),
        }
        .expect("built-in attachment types are registered")
    }
}

impl Appendix for Attachment {
    fn appendix_name(&self) -> &'static str {
        match self {
            Attachment::OrdinaryPayment => "OrdinaryPayment",
            Attachment::ArbitraryMessage => "ArbitraryMessage",
            Attachment::AccountInfo { .. } => "AccountInfo",
        }
    }

    fn version(&self) -> u8 {
        match self {
            // Empty attachments carry no version byte even on v1+
            // transactions.
            Attachment::OrdinaryPayment | Attachment::ArbitraryMessage => 0,
            Attachment::AccountInfo { .. } => 1,
        }
    }

    fn my_size(&self) -> usize {
        match self {
            Attachment::OrdinaryPayment | Attachment::ArbitraryMessage => 0,
            Attachment::AccountInfo { name, description } => {
                1 + name.len() + 2 + description.len()
            }
        }
    }

    fn put_my_bytes(&self, out: &mut Vec<u8>) {
        if let Attachment::AccountInfo { name, description } = self {
            out.push(name.len() as u8);
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&(description.len() as u16).to_le_bytes());
            out.extend_from_slice(description.as_bytes());
        }
    }

    fn my_json(&self) -> JsonMap {
        let mut json = JsonMap::new();
        if let Attachment::AccountInfo { name, description } = self {
            json.insert("name".into(), Value::from(name.clone()));
            json.insert("description".into(), Value::from(description.clone()));
        }
        json
    }

    fn verify_version(&self, transaction_version: u8) -> bool {
        match self {
            Attachment::OrdinaryPayment | Attachment::ArbitraryMessage => self.version() == 0,
            Attachment::AccountInfo { .. } => transaction_version != 0,
        }
    }

    fn baseline_fee(&self) -> Fee {
        self.transaction_type().baseline_fee()
    }

    fn next_fee(&self) -> Fee {
        self.transaction_type().next_fee()
    }

    fn validate(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        self.transaction_type().validate_attachment(transaction, ctx)
    }

    fn apply(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
        sender_id: u64,
        recipient_id: Option<u64>,
    ) {
        let transaction_type = self.transaction_type();
        let event = transaction_type.ledger_event();
        let transaction_id = transaction.id();
        if !self.is_phased(transaction) {
            ctx.accounts.add_to_balance_nqt(
                event,
                transaction_id,
                sender_id,
                -transaction.amount_nqt(),
                -transaction.fee_nqt(),
            );
        } else {
            // The fee was charged at inclusion; only the amount moves when
            // the phased effects execute.
            ctx.accounts.add_to_balance_nqt(
                event,
                transaction_id,
                sender_id,
                -transaction.amount_nqt(),
                0,
            );
        }
        if let Some(recipient_id) = recipient_id {
            ctx.accounts.add_to_balance_and_unconfirmed_balance_nqt(
                event,
                transaction_id,
                recipient_id,
                transaction.amount_nqt(),
            );
        }
        transaction_type.apply_attachment(transaction, ctx, sender_id, recipient_id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
