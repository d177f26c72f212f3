//! Fee schedules.
//!
//! Every appendage (the attachment included) quotes a fee through one of
//! two schedules: a flat amount, or a flat amount plus a per-unit charge on
//! the appendage's full size. The minimum fee of a transaction is the sum
//! over its appendages, so adding an appendage can only raise the floor.

use crate::config;

/// A fee schedule attached to one appendage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fee {
    /// Flat fee regardless of size.
    Constant(i64),
    /// `constant_fee` plus `fee_per_unit` for every started `unit_size`
    /// bytes of the appendage's full size.
    SizeBased {
        constant_fee: i64,
        fee_per_unit: i64,
        unit_size: u32,
    },
}

impl Fee {
    /// No charge. The default for appendages that ride on the transaction
    /// type's own fee.
    pub const NONE: Fee = Fee::Constant(0);

    /// One whole coin, the baseline for most transaction types.
    pub const DEFAULT: Fee = Fee::Constant(config::ONE_QBR);

    /// The fee in NQT for an appendage of `size` bytes.
    pub fn fee_nqt(&self, size: usize) -> i64 {
        match *self {
            Fee::Constant(fee) => fee,
            Fee::SizeBased {
                constant_fee,
                fee_per_unit,
                unit_size,
            } => {
                // Units are counted started, not completed: a one-byte
                // payload already pays for its first unit.
                let units = if size == 0 {
                    0
                } else {
                    (size as i64 - 1) / i64::from(unit_size) + 1
                };
                constant_fee.saturating_add(fee_per_unit.saturating_mul(units))
            }
        }
    }
}
