//! Database layer with `SeaORM` entities, repositories and batch jobs.
//!
//! This crate provides:
//! - `SeaORM` entity definitions and row conversions
//! - Wallet-level locking around the pure ledger engine
//! - Repository abstractions for data access
//! - Accrual, reconciliation and rollover jobs
//! - Database migrations

pub mod convert;
pub mod entities;
pub mod jobs;
pub mod locking;
pub mod migration;
pub mod repositories;

pub use jobs::{AccrualJob, ReconciliationJob, ReconciliationOptions, RolloverJob};
pub use repositories::{
    LedgerRepository, RepositoryError, ReservationRepository, WalletRepository,
};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use saldo_shared::DatabaseConfig;

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection sized from the configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
