//! Balance types and their decimal precision rules.
//!
//! A balance type is described by the [`BalanceKind`] trait. The ledger engine
//! is generic over it and is instantiated for leave balances
//! ([`LeaveBalanceType`]) and expense budgets ([`ExpenseBalanceType`]).

pub mod expense;
pub mod kind;
pub mod leave;

pub use expense::ExpenseBalanceType;
pub use kind::{BalanceKind, BalanceUnit};
pub use leave::LeaveBalanceType;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::ledger::WalletError;

/// Rounds a value to the precision of the balance type using Banker's Rounding.
#[must_use]
pub fn quantize<B: BalanceKind>(kind: B, value: Decimal) -> Decimal {
    value.round_dp_with_strategy(kind.scale(), RoundingStrategy::MidpointNearestEven)
}

/// Rejects amounts carrying more decimal places than the balance type allows.
pub fn check_precision<B: BalanceKind>(kind: B, amount: Decimal) -> Result<(), WalletError> {
    if amount.normalize().scale() > kind.scale() {
        return Err(WalletError::InvalidPrecision {
            balance_type: kind.to_string(),
            amount,
            scale: kind.scale(),
        });
    }
    Ok(())
}

/// Validates a strictly positive request amount.
pub fn check_positive<B: BalanceKind>(kind: B, amount: Decimal) -> Result<(), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::NonPositiveAmount(amount));
    }
    check_precision(kind, amount)
}
