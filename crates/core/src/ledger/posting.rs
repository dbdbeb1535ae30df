//! Transaction requests and posting results.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use saldo_shared::types::{PostingId, UserId};
use serde::{Deserialize, Serialize};

use super::entry::{LedgerEntry, LedgerEntryType, Reference};
use super::error::WalletError;
use crate::balance::BalanceKind;
use crate::bucket::BucketDraw;

/// Transaction type accepted by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Accrual credit.
    Accrual,
    /// Consumption of balance.
    Deduction,
    /// Reversal of a consumption.
    Refund,
    /// Signed manual correction.
    Adjustment,
    /// Balance brought forward.
    CarryOver,
}

impl TransactionType {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accrual => "accrual",
            Self::Deduction => "deduction",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
            Self::CarryOver => "carry_over",
        }
    }

    /// Ledger entry type written for this transaction type.
    #[must_use]
    pub const fn entry_type(self) -> LedgerEntryType {
        match self {
            Self::Accrual => LedgerEntryType::Accrual,
            Self::Deduction => LedgerEntryType::Usage,
            Self::Refund => LedgerEntryType::Reversal,
            Self::Adjustment => LedgerEntryType::AdjustmentAdd,
            Self::CarryOver => LedgerEntryType::CarryOver,
        }
    }

    /// True for types accepting negative amounts (corrections).
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Accrual | Self::Adjustment)
    }

    /// True when a closed wallet refuses this transaction type.
    #[must_use]
    pub const fn blocked_when_closed(self) -> bool {
        matches!(self, Self::Accrual | Self::Deduction | Self::CarryOver)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accrual" => Ok(Self::Accrual),
            "deduction" => Ok(Self::Deduction),
            "refund" => Ok(Self::Refund),
            "adjustment" => Ok(Self::Adjustment),
            "carry_over" => Ok(Self::CarryOver),
            _ => Err(WalletError::UnknownTransactionType(s.to_string())),
        }
    }
}

/// Whether a deduction must be covered by the available balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SufficiencyPolicy {
    /// Refuse deductions above the available balance.
    #[default]
    Enforce,
    /// Post regardless; the bucket may go negative.
    Tolerate,
}

/// A request to post one transaction on a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest<B: BalanceKind> {
    /// Transaction type.
    pub transaction_type: TransactionType,
    /// Request-level balance type (aliases allowed).
    pub balance_type: B,
    /// Positive amount; signed for accruals and adjustments.
    pub amount: Decimal,
    /// Idempotency reference.
    pub reference: Option<Reference>,
    /// Description copied to every line.
    pub description: Option<String>,
    /// Expiry of additive lines; defaults to the bucket's expiry.
    pub expiry_date: Option<NaiveDate>,
    /// Acting user.
    pub created_by: Option<UserId>,
    /// Sufficiency policy for deductions.
    pub policy: SufficiencyPolicy,
}

impl<B: BalanceKind> TransactionRequest<B> {
    /// Creates a request without reference.
    #[must_use]
    pub fn new(transaction_type: TransactionType, balance_type: B, amount: Decimal) -> Self {
        Self {
            transaction_type,
            balance_type,
            amount,
            reference: None,
            description: None,
            expiry_date: None,
            created_by: None,
            policy: SufficiencyPolicy::Enforce,
        }
    }

    /// Sets the idempotency reference.
    #[must_use]
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the expiry of additive lines.
    #[must_use]
    pub fn with_expiry(mut self, expiry_date: NaiveDate) -> Self {
        self.expiry_date = Some(expiry_date);
        self
    }

    /// Sets the acting user.
    #[must_use]
    pub fn created_by(mut self, user_id: UserId) -> Self {
        self.created_by = Some(user_id);
        self
    }

    /// Skips the sufficiency check.
    #[must_use]
    pub fn tolerant(mut self) -> Self {
        self.policy = SufficiencyPolicy::Tolerate;
        self
    }
}

/// Non-fatal finding attached to a posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostingWarning<B: BalanceKind> {
    /// Additive entries could not cover a consumption.
    BucketShortfall {
        /// Bucket consumed.
        balance_type: B,
        /// Amount to consume.
        requested: Decimal,
        /// Amount covered by remaining entries.
        covered: Decimal,
        /// Uncovered part.
        shortfall: Decimal,
    },
}

impl<B: BalanceKind> fmt::Display for PostingWarning<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BucketShortfall {
                balance_type,
                requested,
                covered,
                shortfall,
            } => write!(
                f,
                "bucket {balance_type} short by {shortfall}: requested={requested}, covered={covered}"
            ),
        }
    }
}

/// Lines written by one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Posting<B: BalanceKind> {
    /// Shared id of the lines.
    pub posting_id: PostingId,
    /// Entry type of the lines.
    pub entry_type: LedgerEntryType,
    /// Lines, one per touched bucket.
    pub lines: Vec<LedgerEntry<B>>,
    /// FIFO draws made by negative lines.
    pub draws: Vec<BucketDraw>,
    /// Non-fatal findings.
    pub warnings: Vec<PostingWarning<B>>,
}

impl<B: BalanceKind> Posting<B> {
    /// Rebuilds a posting view from stored lines.
    #[must_use]
    pub fn from_lines(lines: Vec<LedgerEntry<B>>) -> Option<Self> {
        let first = lines.first()?;
        Some(Self {
            posting_id: first.posting_id,
            entry_type: first.entry_type,
            lines,
            draws: Vec::new(),
            warnings: Vec::new(),
        })
    }

    /// Net amount of the lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(|l| l.amount).sum()
    }
}

/// Result of posting a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "posting", rename_all = "snake_case")]
pub enum PostingOutcome<B: BalanceKind> {
    /// New lines were written.
    Posted(Posting<B>),
    /// A posting with the same reference already exists; nothing written.
    Duplicate(Posting<B>),
    /// Nothing to do (refund of a reference without usage).
    Noop,
}

impl<B: BalanceKind> PostingOutcome<B> {
    /// The new or existing posting.
    #[must_use]
    pub fn posting(&self) -> Option<&Posting<B>> {
        match self {
            Self::Posted(p) | Self::Duplicate(p) => Some(p),
            Self::Noop => None,
        }
    }

    /// True when lines were written.
    #[must_use]
    pub fn is_posted(&self) -> bool {
        matches!(self, Self::Posted(_))
    }

    /// Warnings of a new posting.
    #[must_use]
    pub fn warnings(&self) -> &[PostingWarning<B>] {
        match self {
            Self::Posted(p) => &p.warnings,
            Self::Duplicate(_) | Self::Noop => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::LeaveBalanceType;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_type_mapping() {
        assert_eq!(TransactionType::Deduction.entry_type(), LedgerEntryType::Usage);
        assert_eq!(TransactionType::Refund.entry_type(), LedgerEntryType::Reversal);
        assert_eq!(
            TransactionType::Adjustment.entry_type(),
            LedgerEntryType::AdjustmentAdd
        );
        assert!(TransactionType::CarryOver.blocked_when_closed());
        assert!(!TransactionType::Refund.blocked_when_closed());
        assert!(!TransactionType::Adjustment.blocked_when_closed());
    }

    #[test]
    fn test_transaction_type_parse() {
        assert_eq!(
            "carry_over".parse::<TransactionType>().unwrap(),
            TransactionType::CarryOver
        );
        assert!(matches!(
            "transfer".parse::<TransactionType>(),
            Err(WalletError::UnknownTransactionType(_))
        ));
        let parsed: TransactionType = serde_json::from_str("\"deduction\"").unwrap();
        assert_eq!(parsed, TransactionType::Deduction);
    }

    #[test]
    fn test_request_builder() {
        let request = TransactionRequest::new(
            TransactionType::Deduction,
            LeaveBalanceType::Vacation,
            dec!(2),
        )
        .with_reference(Reference::leave_request("lr-1").unwrap())
        .with_description("Summer")
        .tolerant();

        assert_eq!(request.policy, SufficiencyPolicy::Tolerate);
        assert_eq!(request.description.as_deref(), Some("Summer"));
        assert!(request.reference.is_some());
    }

    #[test]
    fn test_warning_display() {
        let warning = PostingWarning::BucketShortfall {
            balance_type: LeaveBalanceType::VacationAc,
            requested: dec!(3),
            covered: dec!(1),
            shortfall: dec!(2),
        };
        assert_eq!(
            warning.to_string(),
            "bucket vacation_ac short by 2: requested=3, covered=1"
        );
    }
}
