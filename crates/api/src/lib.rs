//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - Wallet routes used by the leave workflow and audit consumers
//! - Internal reservation routes (`reserve`, `confirm`, `cancel`, `check`)
//! - Health and readiness endpoints

pub mod error;
pub mod routes;

use axum::Router;
use saldo_shared::LedgerConfig;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Ledger settings (reservation TTL, ...).
    pub ledger: Arc<LedgerConfig>,
}

impl AppState {
    /// Creates the state from a connection and the ledger settings.
    #[must_use]
    pub fn new(db: DatabaseConnection, ledger: LedgerConfig) -> Self {
        Self {
            db: Arc::new(db),
            ledger: Arc::new(ledger),
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    routes::api_routes()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
