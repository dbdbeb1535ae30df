//! JSON error responses.
//!
//! Every failure is answered as `{"error": <CODE>, "message": <text>}` with
//! the status of its error class.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use saldo_core::ledger::WalletError;
use saldo_db::RepositoryError;
use serde_json::json;
use tracing::error;

/// Builds an error response.
pub fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Response for a domain error raised before storage is touched.
pub fn wallet_error(err: &WalletError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(status, err.error_code(), err.to_string())
}

/// Response for a repository failure; server-side failures are logged and
/// their details withheld.
pub fn repository_error(err: &RepositoryError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %err, "Request failed");
        return error_response(status, err.error_code(), "An error occurred");
    }
    error_response(status, err.error_code(), err.to_string())
}
