//! Wallet routes.
//!
//! - `GET /wallets/{user_id}?year=` wallet snapshot
//! - `GET /wallets/{user_id}/available/{balance_type}?year=`
//! - `POST /wallets/{user_id}/transactions`
//! - `GET /wallets/{user_id}/ledger?year=&balance_type=&page=&per_page=` audit export

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use saldo_core::balance::{LeaveBalanceType, check_positive, check_precision};
use saldo_core::ledger::{
    Posting, PostingOutcome, Reference, ReferenceType, TransactionRequest, TransactionType,
    WalletError, WalletSnapshot,
};
use saldo_db::{LedgerRepository, WalletRepository};
use saldo_shared::types::{PageRequest, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_balance_type, resolve_year};
use crate::AppState;
use crate::error::{repository_error, wallet_error};

/// Creates the wallet routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wallets/{user_id}", get(get_wallet))
        .route("/wallets/{user_id}/available/{balance_type}", get(get_available))
        .route("/wallets/{user_id}/transactions", post(post_transaction))
        .route("/wallets/{user_id}/ledger", get(list_ledger))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query selecting a wallet year.
#[derive(Debug, Deserialize)]
pub struct YearQuery {
    /// Wallet year; the current year when absent.
    pub year: Option<i32>,
}

/// Available balance of one type.
#[derive(Debug, Serialize)]
pub struct AvailableResponse {
    /// Requested balance type.
    pub balance_type: LeaveBalanceType,
    /// Wallet year.
    pub year: i32,
    /// Balance minus active reservations.
    #[serde(with = "rust_decimal::serde::float")]
    pub available: Decimal,
}

/// Request body for posting a transaction.
#[derive(Debug, Deserialize)]
pub struct PostTransactionRequest {
    /// `accrual`, `deduction`, `refund`, `adjustment` or `carry_over`.
    pub transaction_type: String,
    /// Balance type code.
    pub balance_type: String,
    /// Amount; signed for accruals and adjustments.
    pub amount: Decimal,
    /// Idempotency reference (a leave request id for deductions and refunds).
    pub reference_id: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Expiry of credited balance.
    pub expiry_date: Option<NaiveDate>,
    /// Wallet year; the current year when absent.
    pub year: Option<i32>,
    /// Acting user.
    pub created_by: Option<Uuid>,
}

/// Result of a posted transaction.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// `posted`, `duplicate` or `noop`.
    pub status: &'static str,
    /// Written lines, or the earlier posting of a duplicate reference.
    pub posting: Option<Posting<LeaveBalanceType>>,
    /// Wallet after the transaction.
    pub wallet: WalletSnapshot,
}

/// Query of the ledger export.
#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    /// Wallet year; the current year when absent.
    pub year: Option<i32>,
    /// Restricts the lines to one balance type.
    pub balance_type: Option<String>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Lines per page.
    pub per_page: Option<u32>,
}

/// Turns a request body into a ledger transaction request.
///
/// Deduction and refund references name a leave request; any other
/// reference is a manual one.
pub fn transaction_request(
    payload: PostTransactionRequest,
) -> Result<TransactionRequest<LeaveBalanceType>, WalletError> {
    let transaction_type: TransactionType = payload.transaction_type.parse()?;
    let balance_type: LeaveBalanceType = payload.balance_type.parse()?;

    if transaction_type.is_signed() {
        if payload.amount.is_zero() {
            return Err(WalletError::ZeroAmount);
        }
        check_precision(balance_type, payload.amount)?;
    } else {
        check_positive(balance_type, payload.amount)?;
    }

    let mut request = TransactionRequest::new(transaction_type, balance_type, payload.amount);
    if let Some(reference_id) = payload.reference_id {
        let reference_type = match transaction_type {
            TransactionType::Deduction | TransactionType::Refund => ReferenceType::LeaveRequest,
            _ => ReferenceType::Manual,
        };
        request = request.with_reference(Reference::new(reference_type, reference_id)?);
    }
    if let Some(description) = payload.description {
        request = request.with_description(description);
    }
    if let Some(expiry_date) = payload.expiry_date {
        request = request.with_expiry(expiry_date);
    }
    if let Some(created_by) = payload.created_by {
        request = request.created_by(UserId::from_uuid(created_by));
    }
    Ok(request)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/wallets/{user_id}` - Every counter plus derived availables.
async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<YearQuery>,
) -> Response {
    let now = Utc::now();
    let year = match resolve_year(query.year, now) {
        Ok(year) => year,
        Err(response) => return response,
    };

    let wallets = WalletRepository::new((*state.db).clone());
    match wallets.snapshot(UserId::from_uuid(user_id), year, now).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => repository_error(&e),
    }
}

/// GET `/wallets/{user_id}/available/{balance_type}` - Balance minus active holds.
async fn get_available(
    State(state): State<AppState>,
    Path((user_id, balance_type)): Path<(Uuid, String)>,
    Query(query): Query<YearQuery>,
) -> Response {
    let now = Utc::now();
    let balance_type = match parse_balance_type(&balance_type) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let year = match resolve_year(query.year, now) {
        Ok(year) => year,
        Err(response) => return response,
    };

    let wallets = WalletRepository::new((*state.db).clone());
    match wallets
        .available(UserId::from_uuid(user_id), year, balance_type, now)
        .await
    {
        Ok(available) => (
            StatusCode::OK,
            Json(AvailableResponse {
                balance_type,
                year,
                available,
            }),
        )
            .into_response(),
        Err(e) => repository_error(&e),
    }
}

/// POST `/wallets/{user_id}/transactions` - Posts a transaction.
///
/// Answers 201 when lines were written and 200 when the reference was
/// already posted.
async fn post_transaction(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<PostTransactionRequest>,
) -> Response {
    let now = Utc::now();
    let year = match resolve_year(payload.year, now) {
        Ok(year) => year,
        Err(response) => return response,
    };
    let request = match transaction_request(payload) {
        Ok(request) => request,
        Err(e) => return wallet_error(&e),
    };

    let user_id = UserId::from_uuid(user_id);
    let wallets = WalletRepository::new((*state.db).clone());
    let outcome = match wallets.post(user_id, year, request, now).await {
        Ok(outcome) => outcome,
        Err(e) => return repository_error(&e),
    };
    let wallet = match wallets.snapshot(user_id, year, now).await {
        Ok(wallet) => wallet,
        Err(e) => return repository_error(&e),
    };

    let (status_code, status, posting) = match outcome {
        PostingOutcome::Posted(posting) => (StatusCode::CREATED, "posted", Some(posting)),
        PostingOutcome::Duplicate(posting) => (StatusCode::OK, "duplicate", Some(posting)),
        PostingOutcome::Noop => (StatusCode::OK, "noop", None),
    };
    (
        status_code,
        Json(TransactionResponse {
            status,
            posting,
            wallet,
        }),
    )
        .into_response()
}

/// GET `/wallets/{user_id}/ledger` - Paginated ledger lines in write order.
async fn list_ledger(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<LedgerQuery>,
) -> Response {
    let year = match resolve_year(query.year, Utc::now()) {
        Ok(year) => year,
        Err(response) => return response,
    };
    let balance_type = match query.balance_type.as_deref().map(parse_balance_type).transpose() {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let page = PageRequest::from_query(query.page, query.per_page);

    let ledger = LedgerRepository::new((*state.db).clone());
    match ledger
        .list(UserId::from_uuid(user_id), year, balance_type, page)
        .await
    {
        Ok(lines) => (StatusCode::OK, Json(lines)).into_response(),
        Err(e) => repository_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{assert_error, get, post_json};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn payload(transaction_type: &str, balance_type: &str, amount: Decimal) -> PostTransactionRequest {
        PostTransactionRequest {
            transaction_type: transaction_type.into(),
            balance_type: balance_type.into(),
            amount,
            reference_id: None,
            description: None,
            expiry_date: None,
            year: None,
            created_by: None,
        }
    }

    #[test]
    fn test_deduction_reference_is_leave_request() {
        let mut body = payload("deduction", "vacation", dec!(2));
        body.reference_id = Some("lr-42".into());
        let request = transaction_request(body).unwrap();

        assert_eq!(request.transaction_type, TransactionType::Deduction);
        assert_eq!(request.balance_type, LeaveBalanceType::Vacation);
        let reference = request.reference.unwrap();
        assert_eq!(reference.reference_type, ReferenceType::LeaveRequest);
        assert_eq!(reference.reference_id, "lr-42");
    }

    #[test]
    fn test_adjustment_reference_is_manual_and_signed() {
        let mut body = payload("adjustment", "rol", dec!(-1.5));
        body.reference_id = Some("hr-fix-7".into());
        body.description = Some("Correction".into());
        let request = transaction_request(body).unwrap();

        assert_eq!(request.amount, dec!(-1.5));
        assert_eq!(request.reference.unwrap().reference_type, ReferenceType::Manual);
        assert_eq!(request.description.as_deref(), Some("Correction"));
    }

    #[rstest]
    #[case("deduction", "vacation", dec!(0), "NON_POSITIVE_AMOUNT")]
    #[case("refund", "rol", dec!(-2), "NON_POSITIVE_AMOUNT")]
    #[case("adjustment", "rol", dec!(0), "ZERO_AMOUNT")]
    #[case("deduction", "vacation", dec!(1.25), "INVALID_PRECISION")]
    #[case("transfer", "vacation", dec!(1), "UNKNOWN_TRANSACTION_TYPE")]
    #[case("deduction", "sick", dec!(1), "UNKNOWN_BALANCE_TYPE")]
    fn test_invalid_requests(
        #[case] transaction_type: &str,
        #[case] balance_type: &str,
        #[case] amount: Decimal,
        #[case] code: &str,
    ) {
        let err = transaction_request(payload(transaction_type, balance_type, amount)).unwrap_err();
        assert_eq!(err.error_code(), code);
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn test_blank_reference_rejected() {
        let mut body = payload("deduction", "rol", dec!(4));
        body.reference_id = Some("  ".into());
        assert!(matches!(transaction_request(body), Err(WalletError::EmptyReference)));
    }

    #[tokio::test]
    async fn test_year_out_of_range_rejected() {
        let uri = format!("/wallets/{}?year=1999", Uuid::new_v4());
        assert_error(get(&uri).await, StatusCode::BAD_REQUEST, "INVALID_YEAR").await;
    }

    #[tokio::test]
    async fn test_unknown_balance_type_rejected() {
        let uri = format!("/wallets/{}/available/sick?year=2025", Uuid::new_v4());
        assert_error(get(&uri).await, StatusCode::BAD_REQUEST, "UNKNOWN_BALANCE_TYPE").await;
    }

    #[tokio::test]
    async fn test_malformed_user_id_rejected() {
        let response = get("/wallets/not-a-uuid?year=2025").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_transaction_rejected_before_storage() {
        let uri = format!("/wallets/{}/transactions", Uuid::new_v4());
        let body = r#"{"transaction_type":"deduction","balance_type":"vacation","amount":"0","year":2025}"#;
        let body = assert_error(post_json(&uri, body).await, StatusCode::BAD_REQUEST, "NON_POSITIVE_AMOUNT").await;
        assert_eq!(body["message"], "Amount must be positive, got 0");
    }

    #[tokio::test]
    async fn test_ledger_rejects_unknown_filter() {
        let uri = format!("/wallets/{}/ledger?year=2025&balance_type=sick", Uuid::new_v4());
        assert_error(get(&uri).await, StatusCode::BAD_REQUEST, "UNKNOWN_BALANCE_TYPE").await;
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal_error() {
        let uri = format!("/wallets/{}?year=2025", Uuid::new_v4());
        assert_error(get(&uri).await, StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR").await;
    }
}
