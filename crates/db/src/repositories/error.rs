//! Errors of the persistence layer.

use saldo_core::ledger::WalletError;
use saldo_shared::AppError;
use sea_orm::{DbErr, SqlErr};

/// Error types for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Domain rule rejected the operation; nothing was written.
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// A concurrent writer got there first, please retry.
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for RepositoryError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => Self::Conflict(detail),
            _ => Self::Database(err),
        }
    }
}

impl RepositoryError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Wallet(err) => err.error_code(),
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Wallet(err) => err.http_status_code(),
            Self::Conflict(_) => 409,
            Self::Database(_) => 500,
        }
    }

    /// True when a retry may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Wallet(err) => err.is_retryable(),
            Self::Conflict(_) | Self::Database(_) => true,
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Wallet(err) => err.into(),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::Database(err) => Self::Database(err.to_string()),
        }
    }
}
