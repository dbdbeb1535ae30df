//! Wallet and ledger error types.
//!
//! Every failure of the engine is a [`WalletError`]. Each variant belongs to
//! one [`ErrorKind`], which decides how synchronous callers see it.

use rust_decimal::Decimal;
use saldo_shared::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::reservation::ReservationStatus;

/// Error class of a [`WalletError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input (amount, balance type, dates).
    Validation,
    /// Well-formed request refused by a business rule.
    BusinessRule,
    /// Wallet, reservation or entry absent.
    NotFound,
    /// Storage or collaborator failure.
    Internal,
}

/// Errors that can occur during wallet and ledger operations.
#[derive(Debug, Error)]
pub enum WalletError {
    // ========== Validation Errors ==========
    /// Amount must be strictly positive.
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Adjustment amount cannot be zero.
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Amount carries more decimal places than the balance type allows.
    #[error("Amount {amount} exceeds {scale} decimal places for {balance_type}")]
    InvalidPrecision {
        /// Balance type code.
        balance_type: String,
        /// Offending amount.
        amount: Decimal,
        /// Allowed decimal places.
        scale: u32,
    },

    /// Unknown balance type code.
    #[error("Unknown balance type: {0}")]
    UnknownBalanceType(String),

    /// Unknown transaction type code.
    #[error("Unknown transaction type: {0}")]
    UnknownTransactionType(String),

    /// Reference id is blank.
    #[error("Reference id cannot be empty")]
    EmptyReference,

    /// Reservation expiry is not in the future.
    #[error("Reservation expiry must be in the future")]
    InvalidExpiry,

    /// Year outside the supported range.
    #[error("Invalid year: {0}")]
    InvalidYear(i32),

    // ========== Business Rule Errors ==========
    /// Not enough balance for the request.
    #[error("insufficient balance, available={available}, requested={requested}")]
    InsufficientBalance {
        /// Balance type code.
        balance_type: String,
        /// Available balance at check time.
        available: Decimal,
        /// Requested amount.
        requested: Decimal,
    },

    /// Refund larger than what was used.
    #[error("Refund of {requested} exceeds used balance {used}")]
    RefundExceedsUsage {
        /// Total used on the buckets of the balance type.
        used: Decimal,
        /// Requested refund.
        requested: Decimal,
    },

    /// Rollover for this transition was already performed.
    #[error("Rollover from {from_year} already performed for user {user_id}")]
    DuplicateRollover {
        /// User id.
        user_id: Uuid,
        /// Source year of the transition.
        from_year: i32,
    },

    /// Reservation is not in a state allowing the transition.
    #[error("Invalid reservation transition from {from} to {to}")]
    InvalidReservationTransition {
        /// Current status.
        from: ReservationStatus,
        /// Requested status.
        to: ReservationStatus,
    },

    /// Wallet is closed for this kind of posting.
    #[error("Wallet of user {user_id} for {year} is closed")]
    WalletClosed {
        /// User id.
        user_id: Uuid,
        /// Wallet year.
        year: i32,
    },

    // ========== Not Found Errors ==========
    /// Wallet not found.
    #[error("Wallet not found for user {user_id} in {year}")]
    WalletNotFound {
        /// User id.
        user_id: Uuid,
        /// Wallet year.
        year: i32,
    },

    /// No reservation exists for the reference.
    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    // ========== Internal Errors ==========
    /// Collaborating service failed.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Returns the error class.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NonPositiveAmount(_)
            | Self::ZeroAmount
            | Self::InvalidPrecision { .. }
            | Self::UnknownBalanceType(_)
            | Self::UnknownTransactionType(_)
            | Self::EmptyReference
            | Self::InvalidExpiry
            | Self::InvalidYear(_) => ErrorKind::Validation,

            Self::InsufficientBalance { .. }
            | Self::RefundExceedsUsage { .. }
            | Self::DuplicateRollover { .. }
            | Self::InvalidReservationTransition { .. }
            | Self::WalletClosed { .. } => ErrorKind::BusinessRule,

            Self::WalletNotFound { .. } | Self::ReservationNotFound(_) => ErrorKind::NotFound,

            Self::ExternalService(_) | Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::InvalidPrecision { .. } => "INVALID_PRECISION",
            Self::UnknownBalanceType(_) => "UNKNOWN_BALANCE_TYPE",
            Self::UnknownTransactionType(_) => "UNKNOWN_TRANSACTION_TYPE",
            Self::EmptyReference => "EMPTY_REFERENCE",
            Self::InvalidExpiry => "INVALID_EXPIRY",
            Self::InvalidYear(_) => "INVALID_YEAR",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::RefundExceedsUsage { .. } => "REFUND_EXCEEDS_USAGE",
            Self::DuplicateRollover { .. } => "DUPLICATE_ROLLOVER",
            Self::InvalidReservationTransition { .. } => "INVALID_RESERVATION_TRANSITION",
            Self::WalletClosed { .. } => "WALLET_CLOSED",
            Self::WalletNotFound { .. } => "WALLET_NOT_FOUND",
            Self::ReservationNotFound(_) => "RESERVATION_NOT_FOUND",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::BusinessRule => 422,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => match self {
                Self::ExternalService(_) => 502,
                _ => 500,
            },
        }
    }

    /// Returns true if the failure is transient and the call may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::ExternalService(_))
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        let message = err.to_string();
        match err {
            WalletError::ExternalService(_) => Self::ExternalService(message),
            WalletError::Database(_) => Self::Database(message),
            _ => match err.kind() {
                ErrorKind::Validation => Self::Validation(message),
                ErrorKind::BusinessRule => Self::BusinessRule(message),
                ErrorKind::NotFound => Self::NotFound(message),
                ErrorKind::Internal => Self::Internal(message),
            },
        }
    }
}
