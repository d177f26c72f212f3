//! # Validation & Lifecycle
//!
//! The layered admission pipeline and the hooks fired around block
//! inclusion.
//!
//! [`Transaction::validate`] runs the checks in a fixed order, cheapest
//! first: parameter sanity, attachment binding, recipient rules, per-
//! appendage validation, the payload size bound, and then, in normal mode,
//! the fee floor, the economic-cluster binding and account restrictions.
//! The mode is selected automatically: when the transaction is phased,
//! signed, and a poll already exists for its id, it is being re-validated
//! at poll resolution (**atFinish**) and the chain-state checks that were
//! settled at acceptance are skipped.
//!
//! Failures split into two families: `NotValid` is permanent (drop it,
//! blacklist the peer), `NotCurrentlyValid` is recoverable (a fee floor or
//! fork disagreement that may resolve). The split is the caller's retry
//! policy; this module never retries and never logs above debug level.

use std::collections::HashMap;

use crate::chain::ChainContext;
use crate::config;
use crate::crypto;

use super::appendix::Appendix;
use super::types::TypeKey;
use super::{Transaction, TransactionError};

// ---------------------------------------------------------------------------
// Duplicate budget map
// ---------------------------------------------------------------------------

/// Per-block duplicate budgets, keyed by transaction type and a
/// handler-chosen string key.
///
/// `max_count` is the number of additional occurrences tolerated after the
/// first: 0 makes a key exclusive, N allows N+1 total only when every
/// caller passes the same budget. The bookkeeping matches the untyped
/// integer map of the reference node field for field.
#[derive(Debug, Default)]
pub struct Duplicates {
    counts: HashMap<TypeKey, HashMap<String, i32>>,
}

impl Duplicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an occurrence of `key` and reports whether the budget is
    /// exhausted.
    pub fn is_duplicate(&mut self, type_key: TypeKey, key: &str, max_count: i32) -> bool {
        let type_counts = self.counts.entry(type_key).or_default();
        match type_counts.get(key).copied() {
            None => {
                type_counts.insert(key.to_string(), if max_count > 0 { 1 } else { 0 });
                false
            }
            Some(0) => true,
            Some(count) if count < max_count => {
                type_counts.insert(key.to_string(), count + 1);
                false
            }
            Some(_) => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Transaction {
    /// Validates the transaction for admission, or, when a phasing poll
    /// already exists for it, for execution at poll resolution.
    pub fn validate(&self, ctx: &ChainContext) -> Result<(), TransactionError> {
        if self.timestamp() == 0 {
            // Genesis sentinel: no deadline, no fee.
            if self.deadline() != 0 {
                return Err(TransactionError::not_valid(format!(
                    "invalid transaction parameters: timestamp == 0 && deadline({}) != 0",
                    self.deadline()
                )));
            }
            if self.fee_nqt() != 0 {
                return Err(TransactionError::not_valid(format!(
                    "invalid transaction parameters: timestamp == 0 && feeNQT({}) != 0",
                    self.fee_nqt()
                )));
            }
        } else {
            if self.deadline() < 1 {
                return Err(TransactionError::not_valid(format!(
                    "invalid transaction parameters: deadline({}) < 1",
                    self.deadline()
                )));
            }
            if self.fee_nqt() <= 0 {
                return Err(TransactionError::not_valid(format!(
                    "invalid transaction parameters: feeNQT({}) <= 0",
                    self.fee_nqt()
                )));
            }
        }
        if self.fee_nqt() > config::MAX_BALANCE_QNT {
            return Err(TransactionError::not_valid(format!(
                "invalid transaction parameters: feeNQT({}) exceeds MAX_BALANCE_QNT",
                self.fee_nqt()
            )));
        }
        if self.amount_nqt() < 0 || self.amount_nqt() > config::MAX_BALANCE_QNT {
            return Err(TransactionError::not_valid(format!(
                "invalid transaction parameters: amountNQT({}) out of range",
                self.amount_nqt()
            )));
        }

        if self.attachment().transaction_type().type_key() != self.type_key() {
            return Err(TransactionError::not_valid(format!(
                "invalid attachment {} for transaction of type {:?}",
                self.attachment().appendix_name(),
                self.type_key()
            )));
        }

        let transaction_type = self.transaction_type();
        if !transaction_type.can_have_recipient()
            && (self.recipient_id() != 0 || self.amount_nqt() != 0)
        {
            return Err(TransactionError::not_valid(
                "transactions of this type must have recipient == 0, amount == 0",
            ));
        }
        if transaction_type.must_have_recipient() && self.recipient_id() == 0 {
            return Err(TransactionError::not_valid(
                "transactions of this type must have a valid recipient",
            ));
        }

        let validating_at_finish = self.phasing().is_some()
            && self.is_signed()
            && ctx.phasing.poll_exists(self.id());
        for appendage in self.appendages() {
            appendage.load_prunable(self, ctx, false);
            if !appendage.verify_version(self.version()) {
                return Err(TransactionError::not_valid(format!(
                    "invalid {} appendage version {}",
                    appendage.appendix_name(),
                    appendage.version()
                )));
            }
            if validating_at_finish {
                appendage.validate_at_finish(self, ctx)?;
            } else {
                appendage.validate(self, ctx)?;
            }
        }

        if self.full_size() > config::MAX_PAYLOAD_LENGTH {
            return Err(TransactionError::not_valid(format!(
                "transaction size {} exceeds maximum payload size",
                self.full_size()
            )));
        }

        if !validating_at_finish {
            let blockchain_height = ctx.blockchain.height();
            let minimum_fee_nqt = self.minimum_fee_nqt(blockchain_height);
            if self.fee_nqt() < minimum_fee_nqt {
                return Err(TransactionError::not_currently_valid(format!(
                    "transaction fee {} {} less than minimum fee {} {} at height {}",
                    self.fee_nqt(),
                    config::COIN_SYMBOL,
                    minimum_fee_nqt,
                    config::COIN_SYMBOL,
                    blockchain_height
                )));
            }
            if self.ec_block_id() != 0 {
                if blockchain_height < self.ec_block_height() {
                    return Err(TransactionError::not_currently_valid(format!(
                        "ecBlockHeight {} exceeds blockchain height {}",
                        self.ec_block_height(),
                        blockchain_height
                    )));
                }
                if ctx.blockchain.block_id_at_height(self.ec_block_height())
                    != Some(self.ec_block_id())
                {
                    return Err(TransactionError::not_currently_valid(format!(
                        "ecBlockHeight {} does not match ecBlockId {}, \
                         transaction was generated on a fork",
                        self.ec_block_height(),
                        self.ec_block_id()
                    )));
                }
            }
            ctx.restrictions.check_transaction(self)?;
        }
        Ok(())
    }

    // -- signature verification ---------------------------------------------

    /// Cryptographic signature check only: the signature must verify over
    /// the zeroed-signature bytes against the carried sender key. Latched
    /// after the first success.
    pub(crate) fn check_signature(&self) -> bool {
        if self.signature_validated() {
            return true;
        }
        let Some(signature) = self.signature() else {
            return false;
        };
        let valid = crypto::verify(signature, &self.unsigned_bytes(), self.sender_public_key());
        if valid {
            self.latch_valid_signature();
        }
        valid
    }

    /// Full signature verification: the cryptographic check plus binding
    /// the sender key to the sender account (first-seen set, or equality
    /// against the stored key).
    pub fn verify_signature(&self, ctx: &ChainContext) -> bool {
        self.check_signature()
            && ctx
                .accounts
                .set_or_verify(self.sender_id(), self.sender_public_key())
    }

    // -- lifecycle hooks ----------------------------------------------------

    /// Whether the attachment's effects are deferred to poll resolution.
    pub fn attachment_is_phased(&self) -> bool {
        self.attachment().is_phased(self)
    }

    /// Reserves the transaction's cost against the sender's unconfirmed
    /// balance. Returns `false` on a missing sender account or an
    /// insufficient balance; that is the double-spend signal.
    pub fn apply_unconfirmed(&self, ctx: &ChainContext) -> bool {
        ctx.accounts.exists(self.sender_id())
            && self.transaction_type().apply_unconfirmed(self, ctx)
    }

    /// Applies the transaction at block inclusion.
    ///
    /// Records the sender key, materializes the recipient account, refunds
    /// the referenced-hash pool deposit, and either charges only the fee
    /// (phased) or applies every non-phased appendage.
    pub fn apply(&self, ctx: &ChainContext) {
        let sender_id = self.sender_id();
        ctx.accounts.apply_public_key(sender_id, self.sender_public_key());
        let recipient_id = (self.recipient_id() != 0).then_some(self.recipient_id());
        if let Some(recipient_id) = recipient_id {
            ctx.accounts.add_or_get(recipient_id);
        }
        let event = self.transaction_type().ledger_event();
        if self.referenced_transaction_full_hash().is_some() {
            ctx.accounts.add_to_unconfirmed_balance_nqt(
                event,
                self.id(),
                sender_id,
                0,
                config::UNCONFIRMED_POOL_DEPOSIT_QNT,
            );
        }
        if self.attachment_is_phased() {
            ctx.accounts
                .add_to_balance_nqt(event, self.id(), sender_id, 0, -self.fee_nqt());
        }
        for appendage in self.appendages() {
            if !appendage.is_phased(self) {
                appendage.load_prunable(self, ctx, false);
                appendage.apply(self, ctx, sender_id, recipient_id);
            }
        }
    }

    /// Releases the unconfirmed reservation on pool eviction or reorg.
    pub fn undo_unconfirmed(&self, ctx: &ChainContext) {
        self.transaction_type().undo_unconfirmed(self, ctx);
    }

    /// Per-block duplicate detection, split across acceptance and
    /// execution heights for phased transactions.
    pub fn attachment_is_duplicate(
        &self,
        ctx: &ChainContext,
        duplicates: &mut Duplicates,
        at_acceptance_height: bool,
    ) -> bool {
        if !self.attachment_is_phased() && !at_acceptance_height {
            // Phased transactions with a non-phasable attachment execute
            // immediately; nothing to re-check at finish height.
            return false;
        }
        if at_acceptance_height {
            if ctx.restrictions.is_block_duplicate(self, duplicates) {
                return true;
            }
            if self.transaction_type().is_block_duplicate(self, duplicates) {
                return true;
            }
            if self.attachment_is_phased() {
                return false;
            }
        }
        self.transaction_type().is_duplicate(self, duplicates)
    }

    /// Duplicate detection against the unconfirmed pool.
    pub fn is_unconfirmed_duplicate(&self, duplicates: &mut Duplicates) -> bool {
        self.transaction_type().is_unconfirmed_duplicate(self, duplicates)
    }

    /// Fees paid back to recent block generators, delegated to the type.
    pub fn back_fees(&self) -> Vec<i64> {
        self.transaction_type().back_fees(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::{MemoryBlockchain, MemoryLedger, MemoryPhasingPolls};
    use crate::chain::{Accounts, PhasingPolls};
    use crate::config::ONE_QBR;
    use crate::transaction::appendix::{Attachment, MessageAppendix, PhasingAppendix};
    use crate::transaction::builder::TransactionBuilder;

    const SECRET: &str = "validation suite secret phrase";

    struct Harness {
        blockchain: MemoryBlockchain,
        ledger: MemoryLedger,
        polls: MemoryPhasingPolls,
    }

    impl Harness {
        fn new() -> Self {
            let blockchain = MemoryBlockchain::new();
            blockchain.set_height(1000);
            blockchain.set_block_id(10, 0xAAAA_AAAA_AAAA_AAAA);
            Self {
                blockchain,
                ledger: MemoryLedger::new(),
                polls: MemoryPhasingPolls::new(),
            }
        }

        fn ctx(&self) -> ChainContext<'_> {
            ChainContext::new(&self.blockchain, &self.ledger).with_phasing(&self.polls)
        }
    }

    fn payment_builder() -> TransactionBuilder {
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
    }

    #[test]
    fn valid_payment_passes() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = payment_builder().build_signed(&ctx, SECRET).unwrap();
        tx.validate(&ctx).unwrap();
    }

    #[test]
    fn ec_fork_fails_not_currently_valid() {
        let harness = Harness::new();
        harness.blockchain.set_block_id(10, 0xBEEF);
        let ctx = harness.ctx();
        let tx = payment_builder()
            .ec_block_id(0xDEAD)
            .build_signed(&ctx, SECRET)
            .unwrap();
        match tx.validate(&ctx) {
            Err(TransactionError::NotCurrentlyValid(message)) => {
                assert!(message.contains("generated on a fork"), "got: {message}");
            }
            other => panic!("expected NotCurrentlyValid, got {other:?}"),
        }
    }

    #[test]
    fn ec_height_ahead_of_chain_fails_not_currently_valid() {
        let harness = Harness::new();
        harness.blockchain.set_height(5);
        let ctx = harness.ctx();
        let tx = payment_builder()
            .height(5)
            .build_signed(&ctx, SECRET)
            .unwrap();
        match tx.validate(&ctx) {
            Err(TransactionError::NotCurrentlyValid(message)) => {
                assert!(message.contains("exceeds blockchain height"));
            }
            other => panic!("expected NotCurrentlyValid, got {other:?}"),
        }
    }

    #[test]
    fn signed_low_fee_fails_not_currently_valid() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        // Signed input keeps its verbatim sub-minimum fee and is rejected
        // recoverably at validation.
        let low = TransactionBuilder::new(
            1,
            crypto::public_key(SECRET),
            5 * ONE_QBR,
            1,
            1440,
            Attachment::OrdinaryPayment,
        )
        .recipient_id(0x1122_3344_5566_7788)
        .timestamp(100)
        .ec_block_height(10)
        .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
        .build_signed(&ctx, SECRET)
        .unwrap();
        assert_eq!(low.fee_nqt(), 1, "verbatim fee survives the build");
        match low.validate(&ctx) {
            Err(TransactionError::NotCurrentlyValid(message)) => {
                assert!(message.contains("less than minimum fee"));
            }
            other => panic!("expected NotCurrentlyValid, got {other:?}"),
        }
    }

    #[test]
    fn recipient_forbidden_type_rejects_recipient_and_amount() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = TransactionBuilder::new(
            1,
            crypto::public_key(SECRET),
            0,
            ONE_QBR,
            1440,
            Attachment::AccountInfo {
                name: "alice".into(),
                description: String::new(),
            },
        )
        .recipient_id(42)
        .timestamp(100)
        .ec_block_height(10)
        .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
        .build_signed(&ctx, SECRET)
        .unwrap();
        match tx.validate(&ctx) {
            Err(TransactionError::NotValid(message)) => {
                assert!(message.contains("recipient == 0"));
            }
            other => panic!("expected NotValid, got {other:?}"),
        }
    }

    #[test]
    fn missing_mandatory_recipient_is_rejected() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = TransactionBuilder::new(
            1,
            crypto::public_key(SECRET),
            5 * ONE_QBR,
            ONE_QBR,
            1440,
            Attachment::OrdinaryPayment,
        )
        .timestamp(100)
        .ec_block_height(10)
        .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
        .build_signed(&ctx, SECRET)
        .unwrap();
        assert!(matches!(
            tx.validate(&ctx),
            Err(TransactionError::NotValid(_))
        ));
    }

    #[test]
    fn genesis_sentinel_rules() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        // timestamp 0 with a deadline is permanently invalid.
        let bad = payment_builder()
            .timestamp(0)
            .genesis()
            .build_signed(&ctx, SECRET)
            .unwrap();
        assert!(matches!(bad.validate(&ctx), Err(TransactionError::NotValid(_))));
    }

    #[test]
    fn verify_signature_binds_sender_key_to_ledger() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = payment_builder().build_signed(&ctx, SECRET).unwrap();
        assert!(tx.verify_signature(&ctx));
        // The key is now bound; a conflicting binding fails verification.
        assert!(harness
            .ledger
            .get_public_key(tx.sender_id())
            .is_some());
        assert!(tx.verify_signature(&ctx), "latched verification stays true");
    }

    #[test]
    fn verify_signature_fails_against_conflicting_ledger_key() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = payment_builder().build_signed(&ctx, SECRET).unwrap();
        harness.ledger.set_or_verify(tx.sender_id(), &[7u8; 32]);
        assert!(!tx.verify_signature(&ctx));
    }

    #[test]
    fn unsigned_transaction_never_verifies() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = payment_builder().build(&ctx).unwrap();
        assert!(!tx.check_signature());
    }

    #[test]
    fn apply_unconfirmed_reserves_and_detects_double_spend() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = payment_builder().build_signed(&ctx, SECRET).unwrap();

        // No account at all: double-spend signal.
        assert!(!tx.apply_unconfirmed(&ctx));

        harness.ledger.fund(tx.sender_id(), 6 * ONE_QBR);
        assert!(tx.apply_unconfirmed(&ctx));
        assert_eq!(
            harness.ledger.unconfirmed_balance_nqt(tx.sender_id()),
            0,
            "amount + fee reserved"
        );

        // The second reservation exceeds what is left.
        assert!(!tx.apply_unconfirmed(&ctx));

        tx.undo_unconfirmed(&ctx);
        assert_eq!(
            harness.ledger.unconfirmed_balance_nqt(tx.sender_id()),
            6 * ONE_QBR
        );
    }

    #[test]
    fn referenced_hash_reserves_pool_deposit() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = payment_builder()
            .referenced_transaction_full_hash([0x42; 32])
            .build_signed(&ctx, SECRET)
            .unwrap();

        let needed = 5 * ONE_QBR + tx.fee_nqt() + config::UNCONFIRMED_POOL_DEPOSIT_QNT;
        harness.ledger.fund(tx.sender_id(), needed - 1);
        assert!(!tx.apply_unconfirmed(&ctx), "deposit counts toward the total");

        harness.ledger.fund(tx.sender_id(), 1);
        assert!(tx.apply_unconfirmed(&ctx));

        // Inclusion refunds the deposit hold.
        tx.apply(&ctx);
        assert_eq!(
            harness.ledger.unconfirmed_balance_nqt(tx.sender_id()),
            config::UNCONFIRMED_POOL_DEPOSIT_QNT
        );
    }

    #[test]
    fn apply_moves_balances_and_creates_recipient() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = payment_builder().build_signed(&ctx, SECRET).unwrap();
        harness.ledger.fund(tx.sender_id(), 10 * ONE_QBR);
        assert!(tx.apply_unconfirmed(&ctx));

        assert!(!harness.ledger.exists(tx.recipient_id()));
        tx.apply(&ctx);

        assert_eq!(
            harness.ledger.balance_nqt(tx.sender_id()),
            10 * ONE_QBR - 5 * ONE_QBR - ONE_QBR
        );
        assert_eq!(harness.ledger.balance_nqt(tx.recipient_id()), 5 * ONE_QBR);
        assert_eq!(
            harness.ledger.unconfirmed_balance_nqt(tx.recipient_id()),
            5 * ONE_QBR
        );
        assert_eq!(
            harness.ledger.get_public_key(tx.sender_id()),
            Some(*tx.sender_public_key())
        );
    }

    #[test]
    fn phased_apply_charges_fee_only_and_registers_poll() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = payment_builder()
            .phasing(PhasingAppendix::new(1500, 0, 1, 0, vec![99]))
            .build_signed(&ctx, SECRET)
            .unwrap();
        harness.ledger.fund(tx.sender_id(), 10 * ONE_QBR);
        assert!(tx.apply_unconfirmed(&ctx));
        tx.apply(&ctx);

        // Fee charged, amount untouched, poll registered.
        assert_eq!(
            harness.ledger.balance_nqt(tx.sender_id()),
            10 * ONE_QBR - tx.fee_nqt()
        );
        assert_eq!(harness.ledger.balance_nqt(tx.recipient_id()), 0);
        assert_eq!(harness.polls.finish_height(tx.id()), Some(1500));
    }

    #[test]
    fn at_finish_mode_skips_chain_state_checks() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = payment_builder()
            .phasing(PhasingAppendix::new(1500, 0, 1, 0, vec![99]))
            .build_signed(&ctx, SECRET)
            .unwrap();

        // Break the EC binding; normal validation now fails.
        harness.blockchain.set_block_id(10, 0xBEEF);
        assert!(matches!(
            tx.validate(&harness.ctx()),
            Err(TransactionError::NotCurrentlyValid(_))
        ));

        // With a poll registered the transaction validates at finish, where
        // the EC binding was already settled at acceptance.
        harness.polls.create_poll(tx.id(), 1500);
        tx.validate(&harness.ctx()).unwrap();
    }

    #[test]
    fn account_info_apply_writes_ledger_fields() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = TransactionBuilder::new(
            1,
            crypto::public_key(SECRET),
            0,
            ONE_QBR,
            1440,
            Attachment::AccountInfo {
                name: "alice".into(),
                description: "pays her debts".into(),
            },
        )
        .timestamp(100)
        .ec_block_height(10)
        .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
        .build_signed(&ctx, SECRET)
        .unwrap();
        tx.validate(&ctx).unwrap();

        harness.ledger.fund(tx.sender_id(), 2 * ONE_QBR);
        assert!(tx.apply_unconfirmed(&ctx));
        tx.apply(&ctx);
        assert_eq!(
            harness.ledger.account_info(tx.sender_id()),
            Some(("alice".to_string(), "pays her debts".to_string()))
        );
    }

    #[test]
    fn oversized_message_fails_validation() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = TransactionBuilder::new(
            1,
            crypto::public_key(SECRET),
            0,
            40 * ONE_QBR,
            1440,
            Attachment::ArbitraryMessage,
        )
        .recipient_id(7)
        .timestamp(100)
        .ec_block_height(10)
        .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
        .message(MessageAppendix::binary(vec![0u8; 200]))
        .build_signed(&ctx, SECRET)
        .unwrap();
        assert!(matches!(
            tx.validate(&ctx),
            Err(TransactionError::NotValid(_))
        ));
    }

    #[test]
    fn duplicates_budget_matches_reference_bookkeeping() {
        let mut duplicates = Duplicates::new();
        let key: TypeKey = (1, 5);

        // Exclusive key: first occurrence passes, second is a duplicate.
        assert!(!duplicates.is_duplicate(key, "alice", 0));
        assert!(duplicates.is_duplicate(key, "alice", 0));

        // Budget of 2: three occurrences pass, the fourth is a duplicate.
        assert!(!duplicates.is_duplicate(key, "bob", 2));
        assert!(!duplicates.is_duplicate(key, "bob", 2));
        assert!(!duplicates.is_duplicate(key, "bob", 2));
        assert!(duplicates.is_duplicate(key, "bob", 2));

        // Budgets are scoped per type key.
        assert!(!duplicates.is_duplicate((0, 0), "alice", 0));
    }

    #[test]
    fn account_info_is_block_duplicate_once_per_sender() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let build = |name: &str| {
            TransactionBuilder::new(
                1,
                crypto::public_key(SECRET),
                0,
                ONE_QBR,
                1440,
                Attachment::AccountInfo {
                    name: name.into(),
                    description: String::new(),
                },
            )
            .timestamp(100)
            .ec_block_height(10)
            .ec_block_id(0xAAAA_AAAA_AAAA_AAAA)
            .build_signed(&ctx, SECRET)
            .unwrap()
        };
        let first = build("alice");
        let second = build("still alice");

        let mut duplicates = Duplicates::new();
        assert!(!first.attachment_is_duplicate(&ctx, &mut duplicates, true));
        assert!(second.attachment_is_duplicate(&ctx, &mut duplicates, true));
    }

    #[test]
    fn payment_is_never_a_duplicate() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let tx = payment_builder().build_signed(&ctx, SECRET).unwrap();
        let mut duplicates = Duplicates::new();
        assert!(!tx.attachment_is_duplicate(&ctx, &mut duplicates, true));
        assert!(!tx.attachment_is_duplicate(&ctx, &mut duplicates, true));
        assert!(!tx.is_unconfirmed_duplicate(&mut duplicates));
    }
}
