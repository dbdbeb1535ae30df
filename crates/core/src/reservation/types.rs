//! Reservation domain types and state transitions.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::{PostingId, ReservationId, UserId, WalletId};
use serde::{Deserialize, Serialize};

use crate::balance::BalanceKind;
use crate::ledger::{Posting, WalletError};

/// Reservation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Holding balance.
    Pending,
    /// Converted into a usage posting.
    Confirmed,
    /// Released by the workflow.
    Cancelled,
    /// Released because `expires_at` passed.
    Expired,
}

impl ReservationStatus {
    /// Returns the string representation used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Parses a status from its storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "CANCELLED" => Some(Self::Cancelled),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Returns true for final states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Validates a transition.
    ///
    /// # Returns
    /// * `Ok(to)` when leaving `PENDING` for a terminal state
    /// * `Err(WalletError::InvalidReservationTransition)` otherwise
    pub fn transition(self, to: Self) -> Result<Self, WalletError> {
        if self == Self::Pending && to.is_terminal() {
            Ok(to)
        } else {
            Err(WalletError::InvalidReservationTransition { from: self, to })
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hold of balance for an in-flight leave request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation<B: BalanceKind> {
    /// Reservation id.
    pub id: ReservationId,
    /// Wallet holding the balance.
    pub wallet_id: WalletId,
    /// Owner.
    pub user_id: UserId,
    /// Wallet year.
    pub year: i32,
    /// Leave request reference.
    pub leave_request_id: String,
    /// Reserved balance type.
    pub balance_type: B,
    /// Reserved amount.
    pub amount: Decimal,
    /// Current status.
    pub status: ReservationStatus,
    /// End of the hold.
    pub expires_at: DateTime<Utc>,
    /// Usage posting created on confirmation.
    pub posting_id: Option<PostingId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Time the reservation left `PENDING`.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl<B: BalanceKind> Reservation<B> {
    /// Pending and not yet expired.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expires_at > now
    }

    /// Pending but past its expiry.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expires_at <= now
    }

    /// Moves the reservation to a terminal state.
    pub fn resolve(
        &mut self,
        to: ReservationStatus,
        at: DateTime<Utc>,
        posting_id: Option<PostingId>,
    ) -> Result<ReservationTransition, WalletError> {
        let from = self.status;
        self.status = from.transition(to)?;
        self.resolved_at = Some(at);
        if posting_id.is_some() {
            self.posting_id = posting_id;
        }
        Ok(ReservationTransition {
            reservation_id: self.id,
            from,
            to,
            at,
            posting_id: self.posting_id,
        })
    }
}

/// A status change to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationTransition {
    /// Reservation id.
    pub reservation_id: ReservationId,
    /// Previous status.
    pub from: ReservationStatus,
    /// New status.
    pub to: ReservationStatus,
    /// Time of the change.
    pub at: DateTime<Utc>,
    /// Linked usage posting.
    pub posting_id: Option<PostingId>,
}

/// Input of `reserve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveRequest<B: BalanceKind> {
    /// Leave request reference.
    pub reference_id: String,
    /// Balance type to hold.
    pub balance_type: B,
    /// Amount to hold.
    pub amount: Decimal,
    /// End of the hold.
    pub expires_at: DateTime<Utc>,
}

/// Result of `reserve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome<B: BalanceKind> {
    /// A new hold was created.
    Created(Reservation<B>),
    /// The reference already holds an active reservation.
    Existing(Reservation<B>),
}

impl<B: BalanceKind> ReserveOutcome<B> {
    /// The reservation.
    #[must_use]
    pub fn reservation(&self) -> &Reservation<B> {
        match self {
            Self::Created(r) | Self::Existing(r) => r,
        }
    }

    /// True when a new hold was created.
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Result of `confirm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome<B: BalanceKind> {
    /// Reservation confirmed; `posting` is `None` when the usage already existed.
    Confirmed {
        /// Confirmed reservation.
        reservation: Reservation<B>,
        /// New usage posting.
        posting: Option<Posting<B>>,
    },
    /// Latest reservation of the reference is no longer pending.
    AlreadyResolved(Reservation<B>),
    /// The reference never reserved anything.
    NoReservation,
}

/// Result of `cancel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome<B: BalanceKind> {
    /// Reservation released.
    Cancelled(Reservation<B>),
    /// Latest reservation of the reference is no longer pending.
    AlreadyResolved(Reservation<B>),
    /// The reference never reserved anything.
    NoReservation,
}
