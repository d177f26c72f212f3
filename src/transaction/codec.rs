//! # Wire & JSON Parsing
//!
//! Decoding of external input (raw bytes from peers, JSON from API
//! clients) into a [`TransactionBuilder`]. Encoding is the transaction's
//! own job ([`Transaction::bytes`](super::Transaction::bytes) and
//! [`Transaction::json_object`](super::Transaction::json_object)); this
//! module is the inverse direction, and it is the crate's main
//! attacker-facing surface: every read is bounds-checked and every failure
//! is a permanent `NotValid`.
//!
//! Parsing never consults chain state. A parsed builder still goes through
//! [`TransactionBuilder::build`] and
//! [`Transaction::validate`](super::Transaction::validate) before anything
//! trusts it.

use serde_json::Value;

use crate::chain::ChainContext;

use super::appendix::{
    EncryptToSelfMessageAppendix, EncryptedMessageAppendix, JsonMap, MessageAppendix,
    PhasingAppendix, PrunableEncryptedMessageAppendix, PrunablePlainMessageAppendix,
    PublicKeyAnnouncementAppendix,
};
use super::builder::TransactionBuilder;
use super::types::{self, find_transaction_type};
use super::{Transaction, TransactionError};

// ---------------------------------------------------------------------------
// ByteReader
// ---------------------------------------------------------------------------

/// Bounds-checked little-endian cursor over untrusted bytes.
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take(&mut self, length: usize) -> Result<&'a [u8], TransactionError> {
        if self.remaining() < length {
            return Err(TransactionError::not_valid("transaction bytes too short"));
        }
        let slice = &self.data[self.position..self.position + length];
        self.position += length;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, TransactionError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16, TransactionError> {
        Ok(i16::from_le_bytes(self.take(2)?.try_into().expect("2 bytes")))
    }

    pub fn read_i32(&mut self) -> Result<i32, TransactionError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    pub fn read_i64(&mut self) -> Result<i64, TransactionError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }

    pub fn read_u64(&mut self) -> Result<u64, TransactionError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }

    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>, TransactionError> {
        Ok(self.take(length)?.to_vec())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], TransactionError> {
        Ok(self.take(N)?.try_into().expect("exact length"))
    }
}

/// All-zero wire fields mean "absent".
fn empty_to_none<const N: usize>(bytes: [u8; N]) -> Option<[u8; N]> {
    bytes.iter().any(|&b| b != 0).then_some(bytes)
}

// ---------------------------------------------------------------------------
// Binary parsing
// ---------------------------------------------------------------------------

/// Decodes the canonical wire form into a builder.
///
/// Rejects unknown `(type, subtype)` pairs, truncated input and trailing
/// bytes; converts all-zero hash and signature fields to absent.
pub fn parse_bytes(bytes: &[u8]) -> Result<TransactionBuilder, TransactionError> {
    parse_bytes_inner(bytes).map_err(|error| {
        tracing::debug!(bytes = %hex::encode(bytes), %error, "failed to parse transaction bytes");
        error
    })
}

fn parse_bytes_inner(bytes: &[u8]) -> Result<TransactionBuilder, TransactionError> {
    let mut reader = ByteReader::new(bytes);
    let type_byte = reader.read_u8()?;
    let packed = reader.read_u8()?;
    let version = (packed & 0xF0) >> 4;
    let subtype = packed & 0x0F;
    let timestamp = reader.read_i32()?;
    let deadline = reader.read_i16()?;
    let sender_public_key = reader.read_array::<32>()?;
    let recipient_id = reader.read_u64()?;
    let amount_nqt = reader.read_i64()?;
    let fee_nqt = reader.read_i64()?;
    let referenced_transaction_full_hash = empty_to_none(reader.read_array::<32>()?);
    let signature = empty_to_none(reader.read_array::<64>()?);
    let mut flags = 0i32;
    let mut ec_block_height = 0i32;
    let mut ec_block_id = 0u64;
    if version > 0 {
        flags = reader.read_i32()?;
        ec_block_height = reader.read_i32()?;
        ec_block_id = reader.read_u64()?;
    }

    let transaction_type = find_transaction_type(type_byte, subtype).ok_or_else(|| {
        TransactionError::not_valid(format!("invalid transaction type: {type_byte}, {subtype}"))
    })?;
    let attachment = transaction_type.parse_attachment(&mut reader, version)?;

    let mut builder = TransactionBuilder::new(
        version,
        sender_public_key,
        amount_nqt,
        fee_nqt,
        deadline,
        attachment,
    )
    .timestamp(timestamp)
    .ec_block_height(ec_block_height)
    .ec_block_id(ec_block_id);
    if transaction_type.can_have_recipient() {
        builder = builder.recipient_id(recipient_id);
    }
    if let Some(hash) = referenced_transaction_full_hash {
        builder = builder.referenced_transaction_full_hash(hash);
    }
    if let Some(signature) = signature {
        builder = builder.signature(signature);
    }

    let mut position = 1i32;
    if flags & position != 0
        || (version == 0 && (type_byte, subtype) == types::ARBITRARY_MESSAGE_KEY)
    {
        builder = builder.message(MessageAppendix::parse(&mut reader, version)?);
    }
    position <<= 1;
    if flags & position != 0 {
        builder = builder.encrypted_message(EncryptedMessageAppendix::parse(&mut reader, version)?);
    }
    position <<= 1;
    if flags & position != 0 {
        builder = builder
            .public_key_announcement(PublicKeyAnnouncementAppendix::parse(&mut reader, version)?);
    }
    position <<= 1;
    if flags & position != 0 {
        builder = builder
            .encrypt_to_self_message(EncryptToSelfMessageAppendix::parse(&mut reader, version)?);
    }
    position <<= 1;
    if flags & position != 0 {
        builder = builder.phasing(PhasingAppendix::parse(&mut reader, version)?);
    }
    position <<= 1;
    if flags & position != 0 {
        builder = builder
            .prunable_plain_message(PrunablePlainMessageAppendix::parse(&mut reader, version)?);
    }
    position <<= 1;
    if flags & position != 0 {
        builder = builder.prunable_encrypted_message(PrunableEncryptedMessageAppendix::parse(
            &mut reader,
            version,
        )?);
    }

    if reader.remaining() > 0 {
        return Err(TransactionError::not_valid(format!(
            "transaction bytes too long, {} extra bytes",
            reader.remaining()
        )));
    }
    Ok(builder)
}

/// Decodes wire bytes and rehydrates prunable payloads from the
/// side-channel JSON bag.
pub fn parse_bytes_with_prunables(
    bytes: &[u8],
    prunable_attachments: Option<&Value>,
) -> Result<TransactionBuilder, TransactionError> {
    let mut builder = parse_bytes(bytes)?;
    if let Some(bag) = prunable_attachments.and_then(Value::as_object) {
        if let Some(appendix) = PrunablePlainMessageAppendix::from_json(bag)? {
            builder = builder.prunable_plain_message(appendix);
        }
        if let Some(appendix) = PrunableEncryptedMessageAppendix::from_json(bag)? {
            builder = builder.prunable_encrypted_message(appendix);
        }
    }
    Ok(builder)
}

// ---------------------------------------------------------------------------
// JSON parsing
// ---------------------------------------------------------------------------

/// Decodes the canonical JSON mirror into a builder.
pub fn parse_json(value: &Value) -> Result<TransactionBuilder, TransactionError> {
    parse_json_inner(value).map_err(|error| {
        tracing::debug!(%error, "failed to parse transaction JSON");
        error
    })
}

fn parse_json_inner(value: &Value) -> Result<TransactionBuilder, TransactionError> {
    let object = value
        .as_object()
        .ok_or_else(|| TransactionError::not_valid("transaction JSON must be an object"))?;

    let type_byte = i64_field(object, "type")? as u8;
    let subtype = i64_field(object, "subtype")? as u8;
    let timestamp = i64_field(object, "timestamp")? as i32;
    let deadline = i64_field(object, "deadline")? as i16;
    let sender_public_key = hex_array_field::<32>(object, "senderPublicKey")?
        .ok_or_else(|| TransactionError::not_valid("senderPublicKey missing"))?;
    let amount_nqt = i64_field(object, "amountNQT")?;
    let fee_nqt = i64_field(object, "feeNQT")?;
    let referenced_transaction_full_hash =
        hex_array_field::<32>(object, "referencedTransactionFullHash")?;
    let signature = hex_array_field::<64>(object, "signature")?;
    let version = match object.get("version") {
        Some(value) => value
            .as_i64()
            .ok_or_else(|| TransactionError::not_valid("invalid version"))? as u8,
        None => 0,
    };
    let attachment_data = object.get("attachment").and_then(Value::as_object);
    let mut ec_block_height = 0i32;
    let mut ec_block_id = 0u64;
    if version > 0 {
        ec_block_height = i64_field(object, "ecBlockHeight")? as i32;
        ec_block_id = opt_unsigned_field(object, "ecBlockId")?;
    }

    let transaction_type = find_transaction_type(type_byte, subtype).ok_or_else(|| {
        TransactionError::not_valid(format!("invalid transaction type: {type_byte}, {subtype}"))
    })?;
    let attachment = transaction_type.parse_attachment_json(attachment_data)?;

    let mut builder = TransactionBuilder::new(
        version,
        sender_public_key,
        amount_nqt,
        fee_nqt,
        deadline,
        attachment,
    )
    .timestamp(timestamp)
    .ec_block_height(ec_block_height)
    .ec_block_id(ec_block_id);
    if transaction_type.can_have_recipient() {
        builder = builder.recipient_id(opt_unsigned_field(object, "recipient")?);
    }
    if let Some(hash) = referenced_transaction_full_hash {
        builder = builder.referenced_transaction_full_hash(hash);
    }
    if let Some(signature) = signature {
        builder = builder.signature(signature);
    }

    if let Some(attachment_data) = attachment_data {
        if let Some(appendix) = MessageAppendix::from_json(attachment_data)? {
            builder = builder.message(appendix);
        }
        if let Some(appendix) = EncryptedMessageAppendix::from_json(attachment_data)? {
            builder = builder.encrypted_message(appendix);
        }
        if let Some(appendix) = PublicKeyAnnouncementAppendix::from_json(attachment_data)? {
            builder = builder.public_key_announcement(appendix);
        }
        if let Some(appendix) = EncryptToSelfMessageAppendix::from_json(attachment_data)? {
            builder = builder.encrypt_to_self_message(appendix);
        }
        if let Some(appendix) = PhasingAppendix::from_json(attachment_data)? {
            builder = builder.phasing(appendix);
        }
        if let Some(appendix) = PrunablePlainMessageAppendix::from_json(attachment_data)? {
            builder = builder.prunable_plain_message(appendix);
        }
        if let Some(appendix) = PrunableEncryptedMessageAppendix::from_json(attachment_data)? {
            builder = builder.prunable_encrypted_message(appendix);
        }
    }
    Ok(builder)
}

/// Decodes, builds and signature-checks a peer-delivered JSON transaction.
pub fn parse_transaction(
    value: &Value,
    ctx: &ChainContext,
) -> Result<Transaction, TransactionError> {
    let transaction = parse_json(value)?.build(ctx)?;
    if transaction.is_signed() && !transaction.check_signature() {
        return Err(TransactionError::not_valid("invalid transaction signature"));
    }
    Ok(transaction)
}

// ---------------------------------------------------------------------------
// JSON field helpers
// ---------------------------------------------------------------------------

pub(crate) fn str_field<'a>(
    object: &'a JsonMap,
    key: &str,
) -> Result<&'a str, TransactionError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| TransactionError::not_valid(format!("missing or invalid field {key}")))
}

pub(crate) fn i64_field(object: &JsonMap, key: &str) -> Result<i64, TransactionError> {
    object
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| TransactionError::not_valid(format!("missing or invalid field {key}")))
}

pub(crate) fn bool_field(object: &JsonMap, key: &str, default: bool) -> bool {
    object.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Unsigned 64-bit ids arrive as decimal strings; plain numbers are
/// tolerated for ergonomics. A missing field reads as 0.
pub(crate) fn opt_unsigned_field(object: &JsonMap, key: &str) -> Result<u64, TransactionError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => unsigned_id(value),
    }
}

pub(crate) fn unsigned_id(value: &Value) -> Result<u64, TransactionError> {
    match value {
        Value::String(text) => text
            .parse::<u64>()
            .map_err(|_| TransactionError::not_valid(format!("invalid unsigned id {text}"))),
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| TransactionError::not_valid("invalid unsigned id")),
        _ => Err(TransactionError::not_valid("invalid unsigned id")),
    }
}

/// The `version.<Name>` marker of an appendage, 0 when absent (the legacy
/// version-0 JSON shape).
pub(crate) fn appendix_version(object: &JsonMap, name: &str) -> u8 {
    object
        .get(&format!("version.{name}"))
        .and_then(Value::as_i64)
        .unwrap_or(0) as u8
}

fn hex_array_field<const N: usize>(
    object: &JsonMap,
    key: &str,
) -> Result<Option<[u8; N]>, TransactionError> {
    let Some(text) = object.get(key).and_then(Value::as_str) else {
        return Ok(None);
    };
    let bytes = hex::decode(text)
        .map_err(|_| TransactionError::not_valid(format!("invalid hex in field {key}")))?;
    let array: [u8; N] = bytes.try_into().map_err(|_| {
        TransactionError::not_valid(format!("field {key} must be {N} bytes"))
    })?;
    Ok(Some(array))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::{MemoryBlockchain, MemoryLedger};
    use crate::config::ONE_QBR;
    use crate::crypto;
    use crate::transaction::appendix::{Appendix, Attachment};

    const SECRET: &str = "codec suite secret phrase";

    fn with_ctx<R>(run: impl FnOnce(&ChainContext) -> R) -> R {
        let blockchain = MemoryBlockchain::new();
        blockchain.set_height(1000);
        let ledger = MemoryLedger::new();
        let ctx = ChainContext::new(&blockchain, &ledger);
        run(&ctx)
    }

    fn signed_payment(ctx: &ChainContext) -> Transaction {
        TransactionBuilder::new(
            1,
            crypto::public_key(SECRET),
            5 * ONE_QBR,
            ONE_QBR,
            1440,
            Attachment::OrdinaryPayment,
        )
        .recipient_id(0x1122_3344_5566_7788)
        .timestamp(100)
        .ec_block_height(10)
        .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
        .build_signed(ctx, SECRET)
        .unwrap()
    }

    #[test]
    fn byte_reader_rejects_truncation() {
        let mut reader = ByteReader::new(&[1, 2]);
        assert!(reader.read_i32().is_err());
    }

    #[test]
    fn binary_roundtrip_preserves_identity() {
        with_ctx(|ctx| {
            let tx = signed_payment(ctx);
            let decoded = parse_bytes(tx.bytes()).unwrap().build(ctx).unwrap();
            assert_eq!(decoded.bytes(), tx.bytes());
            assert_eq!(decoded.id(), tx.id());
            assert_eq!(decoded.full_hash(), tx.full_hash());
            assert_eq!(decoded.timestamp(), tx.timestamp());
            assert_eq!(decoded.recipient_id(), tx.recipient_id());
            assert_eq!(decoded.ec_block_id(), tx.ec_block_id());
        });
    }

    #[test]
    fn trailing_byte_is_rejected() {
        with_ctx(|ctx| {
            let tx = signed_payment(ctx);
            let mut bytes = tx.bytes().to_vec();
            bytes.push(0x00);
            match parse_bytes(&bytes) {
                Err(TransactionError::NotValid(message)) => {
                    assert!(message.contains("too long"), "got: {message}");
                }
                other => panic!("expected NotValid, got {other:?}"),
            }
        });
    }

    #[test]
    fn unknown_type_pair_is_rejected() {
        with_ctx(|ctx| {
            let tx = signed_payment(ctx);
            let mut bytes = tx.bytes().to_vec();
            bytes[0] = 9;
            assert!(matches!(
                parse_bytes(&bytes),
                Err(TransactionError::NotValid(_))
            ));
        });
    }

    #[test]
    fn zeroed_optionals_decode_as_absent() {
        with_ctx(|ctx| {
            let unsigned = TransactionBuilder::new(
                1,
                crypto::public_key(SECRET),
                ONE_QBR,
                ONE_QBR,
                1440,
                Attachment::OrdinaryPayment,
            )
            .recipient_id(7)
            .timestamp(100)
            .ec_block_height(10)
            .ec_block_id(7)
            .build(ctx)
            .unwrap();

            let decoded = parse_bytes(unsigned.bytes()).unwrap().build(ctx).unwrap();
            assert!(decoded.signature().is_none());
            assert!(decoded.referenced_transaction_full_hash().is_none());
        });
    }

    #[test]
    fn message_appendage_survives_binary_roundtrip() {
        with_ctx(|ctx| {
            let tx = TransactionBuilder::new(
                1,
                crypto::public_key(SECRET),
                5 * ONE_QBR,
                2 * ONE_QBR,
                1440,
                Attachment::OrdinaryPayment,
            )
            .recipient_id(7)
            .timestamp(100)
            .ec_block_height(10)
            .ec_block_id(7)
            .message(MessageAppendix::text("hi"))
            .build_signed(ctx, SECRET)
            .unwrap();

            let decoded = parse_bytes(tx.bytes()).unwrap().build(ctx).unwrap();
            assert_eq!(decoded.flags(), 0x01);
            assert_eq!(decoded.message().unwrap().message(), b"hi");
            assert_eq!(decoded.id(), tx.id());
        });
    }

    #[test]
    fn version_zero_arbitrary_message_has_implicit_appendage() {
        with_ctx(|ctx| {
            let tx = TransactionBuilder::new(
                0,
                crypto::public_key(SECRET),
                0,
                ONE_QBR,
                1440,
                Attachment::ArbitraryMessage,
            )
            .recipient_id(7)
            .timestamp(100)
            .message(MessageAppendix::legacy_text("legacy"))
            .build_signed(ctx, SECRET)
            .unwrap();
            // v0 header: no flags/EC section.
            assert_eq!(tx.size(), 160 + tx.message().unwrap().size());

            let decoded = parse_bytes(tx.bytes()).unwrap().build(ctx).unwrap();
            let message = decoded.message().unwrap();
            assert_eq!(message.message(), b"legacy");
            assert_eq!(message.version(), 0);
            assert_eq!(decoded.bytes(), tx.bytes());
        });
    }

    #[test]
    fn json_roundtrip_preserves_identity() {
        with_ctx(|ctx| {
            let tx = signed_payment(ctx);
            let decoded = parse_json(&tx.json_object()).unwrap().build(ctx).unwrap();
            assert_eq!(decoded.bytes(), tx.bytes());
            assert_eq!(decoded.id(), tx.id());
        });
    }

    #[test]
    fn json_roundtrip_carries_appendages() {
        with_ctx(|ctx| {
            let announced = crypto::public_key("brand new recipient");
            let tx = TransactionBuilder::new(
                1,
                crypto::public_key(SECRET),
                5 * ONE_QBR,
                3 * ONE_QBR,
                1440,
                Attachment::OrdinaryPayment,
            )
            .recipient_id(crypto::account_id(&announced))
            .timestamp(100)
            .ec_block_height(10)
            .ec_block_id(7)
            .message(MessageAppendix::text("note"))
            .public_key_announcement(PublicKeyAnnouncementAppendix::new(announced))
            .build_signed(ctx, SECRET)
            .unwrap();

            let decoded = parse_json(&tx.json_object()).unwrap().build(ctx).unwrap();
            assert_eq!(decoded.flags(), 0x01 | 0x04);
            assert_eq!(
                decoded.public_key_announcement().unwrap().public_key(),
                &announced
            );
            assert_eq!(decoded.id(), tx.id());
        });
    }

    #[test]
    fn parse_transaction_rejects_bad_signature() {
        with_ctx(|ctx| {
            let tx = signed_payment(ctx);
            let mut json = tx.json_object();
            // Corrupt one signature byte.
            let mut signature = *tx.signature().unwrap();
            signature[0] ^= 0x01;
            json["signature"] = Value::from(hex::encode(signature));
            assert!(matches!(
                parse_transaction(&json, ctx),
                Err(TransactionError::NotValid(_))
            ));
        });
    }

    #[test]
    fn prunable_bag_rehydrates_payload() {
        with_ctx(|ctx| {
            let tx = TransactionBuilder::new(
                1,
                crypto::public_key(SECRET),
                0,
                ONE_QBR,
                1440,
                Attachment::ArbitraryMessage,
            )
            .recipient_id(7)
            .timestamp(100)
            .ec_block_height(10)
            .ec_block_id(7)
            .prunable_plain_message(PrunablePlainMessageAppendix::text("keep me"))
            .build_signed(ctx, SECRET)
            .unwrap();

            let bag = tx.prunable_attachment_json().unwrap();

            // Without the bag the payload is gone; with it the payload is
            // restored and the hash matches.
            let bare = parse_bytes(tx.bytes()).unwrap().build(ctx).unwrap();
            assert!(bare.prunable_plain_message().unwrap().payload().is_none());

            let rehydrated = parse_bytes_with_prunables(tx.bytes(), Some(&bag))
                .unwrap()
                .build(ctx)
                .unwrap();
            let appendix = rehydrated.prunable_plain_message().unwrap();
            assert_eq!(appendix.payload().unwrap().message, b"keep me");
            assert_eq!(
                appendix.hash(),
                tx.prunable_plain_message().unwrap().hash()
            );
            assert_eq!(rehydrated.bytes(), tx.bytes());
        });
    }

    #[test]
    fn unsigned_id_accepts_strings_and_numbers() {
        assert_eq!(unsigned_id(&Value::from("18446744073709551615")).unwrap(), u64::MAX);
        assert_eq!(unsigned_id(&Value::from(42u64)).unwrap(), 42);
        assert!(unsigned_id(&Value::from("not a number")).is_err());
        assert!(unsigned_id(&Value::from(-1)).is_err());
    }
}
