//! API route definitions.

use axum::{Router, response::Response};
use chrono::{DateTime, Datelike, Utc};
use saldo_core::balance::LeaveBalanceType;
use saldo_core::ledger::check_year;

use crate::AppState;
use crate::error::wallet_error;

pub mod health;
pub mod internal;
pub mod wallets;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(wallets::routes())
        .merge(internal::routes())
}

/// Requested wallet year, defaulting to the current one.
pub(crate) fn resolve_year(year: Option<i32>, now: DateTime<Utc>) -> Result<i32, Response> {
    check_year(year.unwrap_or_else(|| now.year())).map_err(|err| wallet_error(&err))
}

/// Parses a balance-type code (`vacation`, `vacation_ap`, `rol`, ...).
pub(crate) fn parse_balance_type(code: &str) -> Result<LeaveBalanceType, Response> {
    code.parse().map_err(|err| wallet_error(&err))
}
