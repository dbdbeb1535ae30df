//! Ledger entries: the append-only audit log of a wallet.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::{LedgerEntryId, PostingId, UserId, WalletId};
use serde::{Deserialize, Serialize};

use super::error::WalletError;
use crate::balance::BalanceKind;

/// Type of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    /// Monthly accrual (delta towards the target balance).
    Accrual,
    /// Consumption, stored with a negative amount.
    Usage,
    /// Manual correction, signed.
    AdjustmentAdd,
    /// Balance brought forward from the previous year.
    CarryOver,
    /// Hold marker; amount-neutral for balances.
    Reservation,
    /// Compensation of an earlier usage.
    Reversal,
}

impl LedgerEntryType {
    /// Returns the string representation used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accrual => "ACCRUAL",
            Self::Usage => "USAGE",
            Self::AdjustmentAdd => "ADJUSTMENT_ADD",
            Self::CarryOver => "CARRY_OVER",
            Self::Reservation => "RESERVATION",
            Self::Reversal => "REVERSAL",
        }
    }

    /// Parses an entry type from its storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACCRUAL" => Some(Self::Accrual),
            "USAGE" => Some(Self::Usage),
            "ADJUSTMENT_ADD" => Some(Self::AdjustmentAdd),
            "CARRY_OVER" => Some(Self::CarryOver),
            "RESERVATION" => Some(Self::Reservation),
            "REVERSAL" => Some(Self::Reversal),
            _ => None,
        }
    }
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a ledger entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    /// A leave request of the workflow service.
    LeaveRequest,
    /// An accrual run (`<year>-<month>`); never used for idempotency.
    Accrual,
    /// A year-end rollover (`<balance>:<from_year>`).
    Rollover,
    /// An administrative transaction.
    Manual,
}

impl ReferenceType {
    /// Returns the string representation used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeaveRequest => "LEAVE_REQUEST",
            Self::Accrual => "ACCRUAL",
            Self::Rollover => "ROLLOVER",
            Self::Manual => "MANUAL",
        }
    }

    /// Parses a reference type from its storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LEAVE_REQUEST" => Some(Self::LeaveRequest),
            "ACCRUAL" => Some(Self::Accrual),
            "ROLLOVER" => Some(Self::Rollover),
            "MANUAL" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idempotency reference of a posting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Kind of referenced object.
    pub reference_type: ReferenceType,
    /// Id of the referenced object.
    pub reference_id: String,
    /// Status of the referenced object when the entry was written.
    pub status: Option<String>,
}

impl Reference {
    /// Creates a reference without status.
    ///
    /// # Errors
    ///
    /// Returns `EmptyReference` when the id is blank.
    pub fn new(reference_type: ReferenceType, reference_id: impl Into<String>) -> Result<Self, WalletError> {
        let reference_id = reference_id.into();
        if reference_id.trim().is_empty() {
            return Err(WalletError::EmptyReference);
        }
        Ok(Self {
            reference_type,
            reference_id,
            status: None,
        })
    }

    /// Creates a leave-request reference.
    pub fn leave_request(reference_id: impl Into<String>) -> Result<Self, WalletError> {
        Self::new(ReferenceType::LeaveRequest, reference_id)
    }

    /// Sets the referenced object's status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// True when both references point at the same object.
    #[must_use]
    pub fn same_target(&self, other: &Self) -> bool {
        self.reference_type == other.reference_type && self.reference_id == other.reference_id
    }
}

/// One line of the ledger, always stored against a concrete bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry<B: BalanceKind> {
    /// Entry id.
    pub id: LedgerEntryId,
    /// Owning wallet.
    pub wallet_id: WalletId,
    /// Wallet year.
    pub year: i32,
    /// Lines written by the same operation share a posting id.
    pub posting_id: PostingId,
    /// Entry type.
    pub entry_type: LedgerEntryType,
    /// Concrete bucket.
    pub balance_type: B,
    /// Signed amount.
    pub amount: Decimal,
    /// Unconsumed part of an additive entry; zero otherwise.
    pub remaining_amount: Decimal,
    /// Idempotency reference.
    pub reference: Option<Reference>,
    /// Expiry of an additive entry.
    pub expiry_date: Option<NaiveDate>,
    /// Free-form description.
    pub description: Option<String>,
    /// Acting user.
    pub created_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl<B: BalanceKind> LedgerEntry<B> {
    /// True for entries that add balance and can be consumed by FIFO.
    #[must_use]
    pub fn is_additive(&self) -> bool {
        self.amount > Decimal::ZERO && self.entry_type != LedgerEntryType::Reservation
    }

    /// True when the entry carries the given reference target.
    #[must_use]
    pub fn refers_to(&self, reference: &Reference) -> bool {
        self.reference
            .as_ref()
            .is_some_and(|r| r.same_target(reference))
    }

    /// Reference id, if any.
    #[must_use]
    pub fn reference_id(&self) -> Option<&str> {
        self.reference.as_ref().map(|r| r.reference_id.as_str())
    }
}
