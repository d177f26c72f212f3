//! # Transaction Types
//!
//! The `(type, subtype)` registry. Every transaction carries exactly one
//! attachment, and the attachment's type handler supplies everything the
//! engine does not do generically: the attachment codec, the fee schedule,
//! recipient rules, validation of the attachment's content, duplicate
//! policy within a block, and the balance hooks fired around inclusion.
//!
//! Unknown `(type, subtype)` pairs are rejected at parse time; there is no
//! "generic" transaction on this network.

use serde_json::Value;

use crate::chain::{ChainContext, LedgerEvent};
use crate::config;

use super::appendix::{Attachment, JsonMap};
use super::codec::ByteReader;
use super::fee::Fee;
use super::validation::Duplicates;
use super::{Transaction, TransactionError};

/// A registry key: the `(type, subtype)` byte pair.
pub type TypeKey = (u8, u8);

pub(crate) const ORDINARY_PAYMENT_KEY: TypeKey = (0, 0);
pub(crate) const ARBITRARY_MESSAGE_KEY: TypeKey = (1, 0);
pub(crate) const ACCOUNT_INFO_KEY: TypeKey = (1, 5);

// ---------------------------------------------------------------------------
// The handler contract
// ---------------------------------------------------------------------------

/// Per-type behavior plugged into the generic transaction envelope.
pub trait TransactionType: Send + Sync {
    fn type_byte(&self) -> u8;
    fn subtype_byte(&self) -> u8;
    fn name(&self) -> &'static str;

    fn type_key(&self) -> TypeKey {
        (self.type_byte(), self.subtype_byte())
    }

    /// Whether transactions of this type may carry a recipient. Types that
    /// cannot must have `recipient_id == 0` and `amount_nqt == 0`.
    fn can_have_recipient(&self) -> bool;

    /// Whether a recipient is mandatory.
    fn must_have_recipient(&self) -> bool {
        self.can_have_recipient()
    }

    /// Parses the attachment from the wire, consuming exactly its span.
    fn parse_attachment(
        &self,
        reader: &mut ByteReader,
        transaction_version: u8,
    ) -> Result<Attachment, TransactionError>;

    /// Parses the attachment from the JSON mirror's `attachment` object.
    fn parse_attachment_json(
        &self,
        attachment: Option<&JsonMap>,
    ) -> Result<Attachment, TransactionError>;

    fn baseline_fee(&self) -> Fee {
        Fee::DEFAULT
    }

    fn next_fee(&self) -> Fee {
        self.baseline_fee()
    }

    fn ledger_event(&self) -> LedgerEvent;

    /// Validates the attachment's content against the transaction and
    /// current chain state.
    fn validate_attachment(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
    ) -> Result<(), TransactionError>;

    /// Reserves the transaction's total cost against the sender's
    /// unconfirmed balance. Returns `false` on insufficient funds, which
    /// is the double-spend signal.
    ///
    /// The reservation covers amount, fee and, when a referenced
    /// transaction hash is present, the pool deposit.
    fn apply_unconfirmed(&self, transaction: &Transaction, ctx: &ChainContext) -> bool {
        let sender_id = transaction.sender_id();
        let amount = transaction.amount_nqt();
        let fee = transaction.fee_nqt();
        let deposit = if transaction.referenced_transaction_full_hash().is_some() {
            config::UNCONFIRMED_POOL_DEPOSIT_QNT
        } else {
            0
        };
        let total = amount.saturating_add(fee).saturating_add(deposit);
        if ctx.accounts.unconfirmed_balance_nqt(sender_id) < total {
            return false;
        }
        let event = self.ledger_event();
        let transaction_id = transaction.id();
        ctx.accounts
            .add_to_unconfirmed_balance_nqt(event, transaction_id, sender_id, -amount, -fee);
        if deposit > 0 {
            ctx.accounts
                .add_to_unconfirmed_balance_nqt(event, transaction_id, sender_id, 0, -deposit);
        }
        if !self.apply_attachment_unconfirmed(transaction, ctx) {
            ctx.accounts
                .add_to_unconfirmed_balance_nqt(event, transaction_id, sender_id, amount, fee);
            if deposit > 0 {
                ctx.accounts
                    .add_to_unconfirmed_balance_nqt(event, transaction_id, sender_id, 0, deposit);
            }
            return false;
        }
        true
    }

    /// Releases the reservation taken by [`apply_unconfirmed`].
    fn undo_unconfirmed(&self, transaction: &Transaction, ctx: &ChainContext) {
        self.undo_attachment_unconfirmed(transaction, ctx);
        let sender_id = transaction.sender_id();
        let event = self.ledger_event();
        let transaction_id = transaction.id();
        ctx.accounts.add_to_unconfirmed_balance_nqt(
            event,
            transaction_id,
            sender_id,
            transaction.amount_nqt(),
            transaction.fee_nqt(),
        );
        if transaction.referenced_transaction_full_hash().is_some() {
            ctx.accounts.add_to_unconfirmed_balance_nqt(
                event,
                transaction_id,
                sender_id,
                0,
                config::UNCONFIRMED_POOL_DEPOSIT_QNT,
            );
        }
    }

    /// Type-specific extra reservation beyond amount and fee.
    fn apply_attachment_unconfirmed(
        &self,
        _transaction: &Transaction,
        _ctx: &ChainContext,
    ) -> bool {
        true
    }

    fn undo_attachment_unconfirmed(&self, _transaction: &Transaction, _ctx: &ChainContext) {}

    /// Applies the attachment's effects at inclusion (or, for phased
    /// transactions, at poll resolution). Generic balance movement has
    /// already happened by the time this runs.
    fn apply_attachment(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
        sender_id: u64,
        recipient_id: Option<u64>,
    );

    /// Duplicate check applied at execution height (and, for non-phased
    /// transactions, at acceptance height).
    fn is_duplicate(&self, _transaction: &Transaction, _duplicates: &mut Duplicates) -> bool {
        false
    }

    /// Duplicate check every transaction gets at block acceptance height.
    fn is_block_duplicate(&self, _transaction: &Transaction, _duplicates: &mut Duplicates) -> bool {
        false
    }

    /// Duplicate check against the unconfirmed pool.
    fn is_unconfirmed_duplicate(
        &self,
        _transaction: &Transaction,
        _duplicates: &mut Duplicates,
    ) -> bool {
        false
    }

    /// Fees paid back to earlier block generators, if the type has any.
    fn back_fees(&self, _transaction: &Transaction) -> Vec<i64> {
        Vec::new()
    }
}

/// Resolves a handler from the wire's `(type, subtype)` pair.
pub fn find_transaction_type(
    type_byte: u8,
    subtype_byte: u8,
) -> Option<&'static dyn TransactionType> {
    match (type_byte, subtype_byte) {
        ORDINARY_PAYMENT_KEY => Some(&OrdinaryPayment),
        ARBITRARY_MESSAGE_KEY => Some(&ArbitraryMessage),
        ACCOUNT_INFO_KEY => Some(&AccountInfo),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Payment / Ordinary — (0, 0)
// ---------------------------------------------------------------------------

/// Plain value transfer.
pub struct OrdinaryPayment;

impl TransactionType for OrdinaryPayment {
    fn type_byte(&self) -> u8 {
        0
    }

    fn subtype_byte(&self) -> u8 {
        0
    }

    fn name(&self) -> &'static str {
        "OrdinaryPayment"
    }

    fn can_have_recipient(&self) -> bool {
        true
    }

    fn parse_attachment(
        &self,
        _reader: &mut ByteReader,
        _transaction_version: u8,
    ) -> Result<Attachment, TransactionError> {
        Ok(Attachment::OrdinaryPayment)
    }

    fn parse_attachment_json(
        &self,
        _attachment: Option<&JsonMap>,
    ) -> Result<Attachment, TransactionError> {
        Ok(Attachment::OrdinaryPayment)
    }

    fn ledger_event(&self) -> LedgerEvent {
        LedgerEvent::OrdinaryPayment
    }

    fn validate_attachment(
        &self,
        transaction: &Transaction,
        _ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        if transaction.amount_nqt() <= 0 || transaction.amount_nqt() >= config::MAX_BALANCE_QNT {
            return Err(TransactionError::not_valid(format!(
                "invalid ordinary payment amount {}",
                transaction.amount_nqt()
            )));
        }
        Ok(())
    }

    fn apply_attachment(&self, _: &Transaction, _: &ChainContext, _: u64, _: Option<u64>) {}
}

// ---------------------------------------------------------------------------
// Messaging / ArbitraryMessage — (1, 0)
// ---------------------------------------------------------------------------

/// Zero-amount carrier for message appendages. The only type that existed
/// in the version-0 wire format with an implicit message after the
/// signature.
pub struct ArbitraryMessage;

impl TransactionType for ArbitraryMessage {
    fn type_byte(&self) -> u8 {
        1
    }

    fn subtype_byte(&self) -> u8 {
        0
    }

    fn name(&self) -> &'static str {
        "ArbitraryMessage"
    }

    fn can_have_recipient(&self) -> bool {
        true
    }

    fn must_have_recipient(&self) -> bool {
        false
    }

    fn parse_attachment(
        &self,
        _reader: &mut ByteReader,
        _transaction_version: u8,
    ) -> Result<Attachment, TransactionError> {
        Ok(Attachment::ArbitraryMessage)
    }

    fn parse_attachment_json(
        &self,
        _attachment: Option<&JsonMap>,
    ) -> Result<Attachment, TransactionError> {
        Ok(Attachment::ArbitraryMessage)
    }

    fn ledger_event(&self) -> LedgerEvent {
        LedgerEvent::ArbitraryMessage
    }

    fn validate_attachment(
        &self,
        transaction: &Transaction,
        _ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        if transaction.amount_nqt() != 0 {
            return Err(TransactionError::not_valid(
                "arbitrary message transactions carry no amount",
            ));
        }
        let has_message = transaction.message().is_some()
            || transaction.encrypted_message().is_some()
            || transaction.prunable_plain_message().is_some()
            || transaction.prunable_encrypted_message().is_some();
        if !has_message {
            return Err(TransactionError::not_valid(
                "arbitrary message transactions must carry a message appendage",
            ));
        }
        Ok(())
    }

    fn apply_attachment(&self, _: &Transaction, _: &ChainContext, _: u64, _: Option<u64>) {}
}

// ---------------------------------------------------------------------------
// Messaging / AccountInfo — (1, 5)
// ---------------------------------------------------------------------------

/// Publishes a name and description for the sender account.
pub struct AccountInfo;

impl TransactionType for AccountInfo {
    fn type_byte(&self) -> u8 {
        1
    }

    fn subtype_byte(&self) -> u8 {
        5
    }

    fn name(&self) -> &'static str {
        "AccountInfo"
    }

    fn can_have_recipient(&self) -> bool {
        false
    }

    fn parse_attachment(
        &self,
        reader: &mut ByteReader,
        transaction_version: u8,
    ) -> Result<Attachment, TransactionError> {
        if transaction_version > 0 {
            // Non-empty attachments carry a version byte ahead of their
            // payload on v1+ transactions.
            reader.read_u8()?;
        }
        let name_length = reader.read_u8()? as usize;
        if name_length > config::MAX_ACCOUNT_NAME_LENGTH {
            return Err(TransactionError::not_valid("account name too long"));
        }
        let name = String::from_utf8(reader.read_bytes(name_length)?)
            .map_err(|_| TransactionError::not_valid("account name is not valid UTF-8"))?;
        let description_length = reader.read_i16()? as usize;
        if description_length > config::MAX_ACCOUNT_DESCRIPTION_LENGTH {
            return Err(TransactionError::not_valid("account description too long"));
        }
        let description = String::from_utf8(reader.read_bytes(description_length)?)
            .map_err(|_| TransactionError::not_valid("account description is not valid UTF-8"))?;
        Ok(Attachment::AccountInfo { name, description })
    }

    fn parse_attachment_json(
        &self,
        attachment: Option<&JsonMap>,
    ) -> Result<Attachment, TransactionError> {
        let attachment = attachment
            .ok_or_else(|| TransactionError::not_valid("account info attachment missing"))?;
        Ok(Attachment::AccountInfo {
            name: attachment
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            description: attachment
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    fn ledger_event(&self) -> LedgerEvent {
        LedgerEvent::AccountInfo
    }

    fn validate_attachment(
        &self,
        transaction: &Transaction,
        _ctx: &ChainContext,
    ) -> Result<(), TransactionError> {
        let Attachment::AccountInfo { name, description } = transaction.attachment() else {
            return Err(TransactionError::not_valid("wrong attachment for AccountInfo"));
        };
        if name.len() > config::MAX_ACCOUNT_NAME_LENGTH {
            return Err(TransactionError::not_valid(format!(
                "invalid account name length {}",
                name.len()
            )));
        }
        if description.len() > config::MAX_ACCOUNT_DESCRIPTION_LENGTH {
            return Err(TransactionError::not_valid(format!(
                "invalid account description length {}",
                description.len()
            )));
        }
        Ok(())
    }

    fn apply_attachment(
        &self,
        transaction: &Transaction,
        ctx: &ChainContext,
        sender_id: u64,
        _recipient_id: Option<u64>,
    ) {
        if let Attachment::AccountInfo { name, description } = transaction.attachment() {
            ctx.accounts.set_account_info(sender_id, name, description);
        }
    }

    fn is_block_duplicate(&self, transaction: &Transaction, duplicates: &mut Duplicates) -> bool {
        // One account-info update per sender per block.
        duplicates.is_duplicate(
            self.type_key(),
            &transaction.sender_id().to_string(),
            0,
        )
    }

    fn is_unconfirmed_duplicate(
        &self,
        transaction: &Transaction,
        duplicates: &mut Duplicates,
    ) -> bool {
        duplicates.is_duplicate(
            self.type_key(),
            &transaction.sender_id().to_string(),
            0,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
