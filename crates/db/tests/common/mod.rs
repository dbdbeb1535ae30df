//! Shared setup for database integration tests.
//!
//! Tests run against the PostgreSQL named by `DATABASE_URL` and return early
//! when it is unset. Every test works on fresh random users, so tests can share
//! one database.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use saldo_core::balance::LeaveBalanceType;
use saldo_core::ledger::{Reference, TransactionRequest, TransactionType};
use saldo_db::migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tokio::sync::OnceCell;

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Connects and migrates, or returns `None` when no database is configured.
pub async fn connect() -> Option<DatabaseConnection> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("Skipping test - DATABASE_URL not set");
        return None;
    };
    let db = match Database::connect(&url).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Skipping test - database not available: {e}");
            return None;
        }
    };
    MIGRATED
        .get_or_try_init(|| async { Migrator::up(&db, None).await })
        .await
        .expect("migrations apply");
    Some(db)
}

/// Fixed clock for tests.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 10, 9, 0, 0).unwrap()
}

/// An accrual onto a bucket.
pub fn accrual(kind: LeaveBalanceType, amount: Decimal) -> TransactionRequest<LeaveBalanceType> {
    TransactionRequest::new(TransactionType::Accrual, kind, amount)
}

/// A carry-over onto a bucket.
pub fn carry_over(kind: LeaveBalanceType, amount: Decimal) -> TransactionRequest<LeaveBalanceType> {
    TransactionRequest::new(TransactionType::CarryOver, kind, amount)
}

/// A deduction referencing a leave request.
pub fn deduction(
    kind: LeaveBalanceType,
    amount: Decimal,
    reference_id: &str,
) -> TransactionRequest<LeaveBalanceType> {
    TransactionRequest::new(TransactionType::Deduction, kind, amount)
        .with_reference(Reference::leave_request(reference_id).unwrap())
}

/// A leave-request reference unique to this run.
pub fn reference(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}
