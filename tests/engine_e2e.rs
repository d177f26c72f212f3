//! End-to-end integration tests for the QBR transaction engine.
//!
//! These tests exercise the full path a transaction travels: building and
//! signing, canonical byte and JSON serialization, decoding of untrusted
//! input, layered validation, and the lifecycle hooks around block
//! inclusion. They prove the engine's laws hold when the pieces compose:
//! round-trips preserve identity, flags mirror appendages, fee floors are
//! monotone, and the immutability discipline survives block attachment.
//!
//! Each test stands alone on its own in-memory chain facades. No shared
//! state, no ordering dependencies, no flaky failures.

use qbr_protocol::chain::memory::{
    MemoryBlockchain, MemoryLedger, MemoryPhasingPolls, MemoryPrunableStore,
};
use qbr_protocol::chain::{Accounts, ChainContext};
use qbr_protocol::config::{MAX_PAYLOAD_LENGTH, ONE_QBR};
use qbr_protocol::crypto;
use qbr_protocol::transaction::{
    parse_bytes, parse_bytes_with_prunables, parse_json, Appendix, Attachment, MessageAppendix,
    PhasingAppendix, PrunablePlainMessageAppendix, PublicKeyAnnouncementAppendix, Transaction,
    TransactionBuilder, TransactionError,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const SECRET: &str = "a fixed test secret nobody should ever fund";

/// In-memory chain facades with the chain at height 1000 and the EC block
/// of scenario S1 registered at height 10.
struct Chain {
    blockchain: MemoryBlockchain,
    ledger: MemoryLedger,
    polls: MemoryPhasingPolls,
    prunables: MemoryPrunableStore,
}

impl Chain {
    fn new() -> Self {
        let blockchain = MemoryBlockchain::new();
        blockchain.set_height(1000);
        blockchain.set_block_id(10, 0xAAAA_AAAA_AAAA_AAAA);
        Self {
            blockchain,
            ledger: MemoryLedger::new(),
            polls: MemoryPhasingPolls::new(),
            prunables: MemoryPrunableStore::new(),
        }
    }

    fn ctx(&self) -> ChainContext<'_> {
        ChainContext::new(&self.blockchain, &self.ledger)
            .with_phasing(&self.polls)
            .with_prunables(&self.prunables)
    }
}

/// The S1 send-money transaction: type 0, subtype 0, version 1,
/// timestamp 100, deadline 1440, amount 5 QBR, fee 1 QBR, fixed recipient
/// and EC block, no optional sections.
fn s1_builder() -> TransactionBuilder {
    TransactionBuilder::new(
        1,
        crypto::public_key(SECRET),
        500_000_000,
        100_000_000,
        1440,
        Attachment::OrdinaryPayment,
    )
    .recipient_id(0x1122_3344_5566_7788)
    .timestamp(100)
    .ec_block_height(10)
    .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
}

fn s1_signed(ctx: &ChainContext) -> Transaction {
    s1_builder().build_signed(ctx, SECRET).expect("S1 builds")
}

// ---------------------------------------------------------------------------
// S1 — SendMoney v1 happy path
// ---------------------------------------------------------------------------

#[test]
fn s1_send_money_happy_path() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let tx = s1_signed(&ctx);

    // Header-only transaction: exactly 176 bytes.
    assert_eq!(tx.bytes().len(), 176);
    assert_eq!(tx.flags(), 0);

    // Signature verifies and binds the sender key.
    assert!(tx.verify_signature(&ctx));

    // Identity is stable across re-derivations.
    let id = tx.id();
    let full_hash = *tx.full_hash();
    for _ in 0..100 {
        assert_eq!(tx.id(), id);
        assert_eq!(tx.full_hash(), &full_hash);
    }

    tx.validate(&ctx).expect("S1 validates");
}

#[test]
fn s1_wire_header_layout() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let tx = s1_signed(&ctx);
    let bytes = tx.bytes();

    assert_eq!(bytes[0], 0, "type");
    assert_eq!(bytes[1], 0x10, "(version << 4) | subtype");
    assert_eq!(i32::from_le_bytes(bytes[2..6].try_into().unwrap()), 100);
    assert_eq!(i16::from_le_bytes(bytes[6..8].try_into().unwrap()), 1440);
    assert_eq!(&bytes[8..40], &crypto::public_key(SECRET));
    assert_eq!(
        u64::from_le_bytes(bytes[40..48].try_into().unwrap()),
        0x1122_3344_5566_7788
    );
    assert_eq!(
        i64::from_le_bytes(bytes[48..56].try_into().unwrap()),
        500_000_000
    );
    assert_eq!(
        i64::from_le_bytes(bytes[56..64].try_into().unwrap()),
        100_000_000
    );
    assert_eq!(&bytes[64..96], &[0u8; 32], "absent referenced hash");
    assert_ne!(&bytes[96..160], &[0u8; 64], "signature present");
    assert_eq!(i32::from_le_bytes(bytes[160..164].try_into().unwrap()), 0);
    assert_eq!(i32::from_le_bytes(bytes[164..168].try_into().unwrap()), 10);
    assert_eq!(
        u64::from_le_bytes(bytes[168..176].try_into().unwrap()),
        0xAAAA_AAAA_AAAA_AAAA
    );
}

// ---------------------------------------------------------------------------
// S2 — trailing bytes are rejected
// ---------------------------------------------------------------------------

#[test]
fn s2_decode_rejects_trailing_bytes() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let tx = s1_signed(&ctx);

    let mut bytes = tx.bytes().to_vec();
    bytes.push(0x00);
    match parse_bytes(&bytes) {
        Err(TransactionError::NotValid(message)) => {
            assert!(message.contains("too long"), "got: {message}");
        }
        other => panic!("expected NotValid(too long), got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// S3 — flag/appendage alignment
// ---------------------------------------------------------------------------

#[test]
fn s3_message_appendage_sets_flag_and_roundtrips() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let bare = s1_signed(&ctx);

    let message = MessageAppendix::text("hi");
    let message_size = message.size();
    let tx = s1_builder()
        .message(message)
        .build_signed(&ctx, SECRET)
        .expect("S3 builds");

    assert_eq!(tx.flags(), 0x01);
    assert_eq!(tx.bytes().len(), bare.bytes().len() + message_size);

    let decoded = parse_bytes(tx.bytes()).unwrap().build(&ctx).unwrap();
    let decoded_message = decoded.message().expect("message reconstructed");
    assert_eq!(decoded_message.message(), b"hi");
    assert!(decoded_message.is_text());
    assert_eq!(decoded.id(), tx.id());
}

#[test]
fn appendages_appear_in_ascending_flag_bit_order() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let announced = crypto::public_key("a recipient with no history");
    let tx = TransactionBuilder::new(
        1,
        crypto::public_key(SECRET),
        500_000_000,
        5 * ONE_QBR,
        1440,
        Attachment::OrdinaryPayment,
    )
    .recipient_id(crypto::account_id(&announced))
    .timestamp(100)
    .ec_block_height(10)
    .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
    .message(MessageAppendix::text("m"))
    .public_key_announcement(PublicKeyAnnouncementAppendix::new(announced))
    .phasing(PhasingAppendix::new(1500, 0, 1, 0, vec![9]))
    .build_signed(&ctx, SECRET)
    .expect("multi-appendage build");

    assert_eq!(tx.flags(), 0x01 | 0x04 | 0x10);

    // The byte right after the header must be the message appendage's
    // version byte, then its payload; the announcement and phasing follow.
    let decoded = parse_bytes(tx.bytes()).unwrap().build(&ctx).unwrap();
    assert_eq!(decoded.message().unwrap().message(), b"m");
    assert_eq!(decoded.public_key_announcement().unwrap().public_key(), &announced);
    assert_eq!(decoded.phasing().unwrap().finish_height(), 1500);
    assert_eq!(decoded.bytes(), tx.bytes());
}

// ---------------------------------------------------------------------------
// S4 — re-signing is refused
// ---------------------------------------------------------------------------

#[test]
fn s4_resigning_loaded_bytes_is_refused() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let tx = s1_signed(&ctx);

    let builder = parse_bytes(tx.bytes()).expect("signed bytes parse");
    match builder.build_signed(&ctx, SECRET) {
        Err(TransactionError::NotValid(message)) => {
            assert!(message.contains("already signed"), "got: {message}");
        }
        other => panic!("expected NotValid(already signed), got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// S5 — fee floor
// ---------------------------------------------------------------------------

#[test]
fn s5_zero_fee_backfilled_under_correct_invalid_fees() {
    let chain = Chain::new();
    let ctx = chain.ctx().with_correct_invalid_fees(true);

    let tx = TransactionBuilder::new(
        1,
        crypto::public_key(SECRET),
        500_000_000,
        0,
        1440,
        Attachment::OrdinaryPayment,
    )
    .recipient_id(0x1122_3344_5566_7788)
    .timestamp(100)
    .ec_block_height(10)
    .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
    .build_signed(&ctx, SECRET)
    .expect("S5 builds");

    assert_eq!(tx.fee_nqt(), tx.minimum_fee_nqt(1000));
    tx.validate(&ctx).expect("backfilled fee validates");
}

#[test]
fn s5_signed_verbatim_low_fee_is_recoverably_rejected() {
    let chain = Chain::new();
    let ctx = chain.ctx().with_correct_invalid_fees(true);

    // feeNQT = 1, signed: the backfill never touches already-signed input,
    // so the low fee survives the build and fails recoverably.
    let low = TransactionBuilder::new(
        1,
        crypto::public_key(SECRET),
        500_000_000,
        1,
        1440,
        Attachment::OrdinaryPayment,
    )
    .recipient_id(0x1122_3344_5566_7788)
    .timestamp(100)
    .ec_block_height(10)
    .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
    .build_signed(&chain.ctx(), SECRET)
    .expect("low-fee build");

    let adopted = parse_bytes(low.bytes())
        .unwrap()
        .build(&ctx)
        .expect("adopted build");
    assert_eq!(adopted.fee_nqt(), 1, "signed input is never rewritten");
    assert!(matches!(
        adopted.validate(&ctx),
        Err(TransactionError::NotCurrentlyValid(_))
    ));
}

#[test]
fn fee_floor_is_monotone_in_appendages() {
    let chain = Chain::new();
    let ctx = chain.ctx();

    let bare = s1_signed(&ctx);
    let with_message = s1_builder()
        .message(MessageAppendix::text("hello"))
        .build_signed(&ctx, SECRET)
        .unwrap();
    let with_more = s1_builder()
        .message(MessageAppendix::text("hello"))
        .phasing(PhasingAppendix::new(1500, 0, 1, 0, vec![]))
        .build_signed(&ctx, SECRET)
        .unwrap();

    let height = 1000;
    assert!(bare.minimum_fee_nqt(height) <= with_message.minimum_fee_nqt(height));
    assert!(with_message.minimum_fee_nqt(height) <= with_more.minimum_fee_nqt(height));
}

// ---------------------------------------------------------------------------
// S6 — EC fork binding
// ---------------------------------------------------------------------------

#[test]
fn s6_ec_fork_is_recoverably_rejected() {
    let chain = Chain::new();
    chain.blockchain.set_block_id(10, 0xBEEF);
    let ctx = chain.ctx();

    let tx = s1_builder()
        .ec_block_id(0xDEAD)
        .build_signed(&ctx, SECRET)
        .expect("fork build");
    match tx.validate(&ctx) {
        Err(TransactionError::NotCurrentlyValid(message)) => {
            assert!(message.contains("generated on a fork"), "got: {message}");
        }
        other => panic!("expected NotCurrentlyValid(fork), got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Round-trip laws
// ---------------------------------------------------------------------------

#[test]
fn binary_roundtrip_preserves_every_consensus_field() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let tx = s1_builder()
        .referenced_transaction_full_hash([0x42; 32])
        .message(MessageAppendix::text("round trip"))
        .build_signed(&ctx, SECRET)
        .unwrap();

    let decoded = parse_bytes(tx.bytes()).unwrap().build(&ctx).unwrap();
    assert_eq!(decoded.bytes(), tx.bytes());
    assert_eq!(decoded.id(), tx.id());
    assert_eq!(decoded.full_hash(), tx.full_hash());
    assert_eq!(decoded.timestamp(), tx.timestamp());
    assert_eq!(decoded.deadline(), tx.deadline());
    assert_eq!(decoded.amount_nqt(), tx.amount_nqt());
    assert_eq!(decoded.fee_nqt(), tx.fee_nqt());
    assert_eq!(decoded.recipient_id(), tx.recipient_id());
    assert_eq!(
        decoded.referenced_transaction_full_hash(),
        tx.referenced_transaction_full_hash()
    );
    assert_eq!(decoded.ec_block_height(), tx.ec_block_height());
    assert_eq!(decoded.ec_block_id(), tx.ec_block_id());
    assert_eq!(decoded.signature(), tx.signature());
}

#[test]
fn json_roundtrip_preserves_identity() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let tx = s1_builder()
        .message(MessageAppendix::text("via json"))
        .build_signed(&ctx, SECRET)
        .unwrap();

    let decoded = parse_json(&tx.json_object()).unwrap().build(&ctx).unwrap();
    assert_eq!(decoded.bytes(), tx.bytes());
    assert_eq!(decoded.id(), tx.id());
    assert_eq!(decoded.full_hash(), tx.full_hash());
}

#[test]
fn prunable_payload_travels_through_the_side_channel() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let tx = TransactionBuilder::new(
        1,
        crypto::public_key(SECRET),
        0,
        2 * ONE_QBR,
        1440,
        Attachment::ArbitraryMessage,
    )
    .recipient_id(7)
    .timestamp(100)
    .ec_block_height(10)
    .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
    .prunable_plain_message(PrunablePlainMessageAppendix::text("sealed archive"))
    .build_signed(&ctx, SECRET)
    .unwrap();

    let bag = tx.prunable_attachment_json().expect("prunable bag");
    let rehydrated = parse_bytes_with_prunables(tx.bytes(), Some(&bag))
        .unwrap()
        .build(&ctx)
        .unwrap();
    assert_eq!(rehydrated.bytes(), tx.bytes());
    assert_eq!(
        rehydrated
            .prunable_plain_message()
            .unwrap()
            .payload()
            .unwrap()
            .message,
        b"sealed archive"
    );
}

#[test]
fn signature_determinism_and_id_stability() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let tx1 = s1_signed(&ctx);
    let tx2 = s1_signed(&ctx);

    // Same unsigned bytes and phrase: bit-identical signature and id.
    assert_eq!(tx1.signature(), tx2.signature());
    assert_eq!(tx1.id(), tx2.id());
    assert_eq!(tx1.full_hash(), tx2.full_hash());

    // Transient block fields never reach the identity.
    tx1.set_block(0xB10C, 999, 4242);
    tx1.set_index(7);
    assert_eq!(tx1.id(), tx2.id());
    assert_eq!(tx1.bytes(), tx2.bytes());
}

// ---------------------------------------------------------------------------
// Size bound
// ---------------------------------------------------------------------------

#[test]
fn accepted_transactions_respect_the_payload_bound() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let tx = s1_signed(&ctx);
    tx.validate(&ctx).unwrap();
    assert!(tx.full_size() <= MAX_PAYLOAD_LENGTH);
}

// ---------------------------------------------------------------------------
// Lifecycle composition
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle_from_build_to_inclusion() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let tx = s1_signed(&ctx);

    chain.ledger.fund(tx.sender_id(), 10 * ONE_QBR);

    tx.validate(&ctx).expect("admission");
    assert!(tx.verify_signature(&ctx), "signature binds");
    assert!(tx.apply_unconfirmed(&ctx), "reservation succeeds");

    // Block inclusion.
    tx.apply(&ctx);
    tx.set_block(0xB10C_1D, 1001, 60_060);
    tx.set_index(0);
    assert_eq!(tx.height(), 1001);
    assert_eq!(tx.index(), 0);

    assert_eq!(
        chain.ledger.balance_nqt(tx.recipient_id()),
        500_000_000,
        "recipient credited"
    );

    // Reorg: the block link clears but the height survives for
    // reinclusion priority, and identity is untouched.
    let id = tx.id();
    tx.unset_block();
    assert_eq!(tx.block_id(), 0);
    assert_eq!(tx.height(), 1001);
    assert_eq!(tx.id(), id);
}

#[test]
fn decoded_peer_transaction_validates_and_applies() {
    let chain = Chain::new();
    let ctx = chain.ctx();
    let original = s1_signed(&ctx);

    // The "peer" hands us raw bytes; everything downstream works from the
    // decoded copy alone.
    let tx = parse_bytes(original.bytes()).unwrap().build(&ctx).unwrap();
    chain.ledger.fund(tx.sender_id(), 10 * ONE_QBR);

    tx.validate(&ctx).expect("decoded admission");
    assert!(tx.verify_signature(&ctx));
    assert!(tx.apply_unconfirmed(&ctx));
    tx.apply(&ctx);
    assert_eq!(chain.ledger.balance_nqt(tx.recipient_id()), 500_000_000);
}
