//! Per (user, year) wallet aggregate.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use saldo_shared::types::{UserId, WalletId};
use serde::{Deserialize, Serialize};

use super::error::WalletError;
use super::sheet::BalanceSheet;
use crate::balance::BalanceKind;

/// Lifecycle status of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletStatus {
    /// Open for every posting.
    #[default]
    Active,
    /// Rolled over; only corrections are accepted.
    Closed,
}

impl WalletStatus {
    /// Returns the string representation used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Closed => "CLOSED",
        }
    }

    /// Parses a status from its storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate balances of one user for one year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet<B: BalanceKind> {
    /// Wallet id.
    pub id: WalletId,
    /// Owner.
    pub user_id: UserId,
    /// Fiscal year.
    pub year: i32,
    /// Lifecycle status.
    pub status: WalletStatus,
    /// Ledger-backed counters.
    pub sheet: BalanceSheet<B>,
    /// Informational annual entitlements, not ledger-backed.
    pub entitlements: BTreeMap<B, Decimal>,
}

impl<B: BalanceKind> Wallet<B> {
    /// Creates a zeroed active wallet.
    #[must_use]
    pub fn new(user_id: UserId, year: i32) -> Self {
        Self {
            id: WalletId::new(),
            user_id,
            year,
            status: WalletStatus::Active,
            sheet: BalanceSheet::new(),
            entitlements: BTreeMap::new(),
        }
    }

    /// Ledger balance of a type (reservations not subtracted).
    #[must_use]
    pub fn balance(&self, kind: B) -> Decimal {
        self.sheet.balance(kind)
    }

    /// True once rolled over.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.status == WalletStatus::Closed
    }

    /// Error returned for postings a closed wallet refuses.
    #[must_use]
    pub fn closed_error(&self) -> WalletError {
        WalletError::WalletClosed {
            user_id: self.user_id.into_inner(),
            year: self.year,
        }
    }
}

/// First year a wallet may exist for.
pub const MIN_YEAR: i32 = 2000;

/// Last year a wallet may exist for.
pub const MAX_YEAR: i32 = 2100;

/// Validates a wallet year.
///
/// # Errors
///
/// Returns `InvalidYear` outside `MIN_YEAR..=MAX_YEAR`.
pub const fn check_year(year: i32) -> Result<i32, WalletError> {
    if year < MIN_YEAR || year > MAX_YEAR {
        return Err(WalletError::InvalidYear(year));
    }
    Ok(year)
}
