//! Internal routes called by the leave workflow.
//!
//! A leave request reserves balance on submission, then confirms it on
//! approval or cancels it on rejection. Every call is safe to retry.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use saldo_core::balance::{LeaveBalanceType, check_positive};
use saldo_core::ledger::{LeaveReservation, Posting, WalletError, check_year};
use saldo_core::reservation::{CancelOutcome, ConfirmOutcome, ReserveOutcome, ReserveRequest};
use saldo_db::{ReservationRepository, WalletRepository};
use saldo_shared::types::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_balance_type, resolve_year};
use crate::AppState;
use crate::error::{repository_error, wallet_error};

/// Creates the internal routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/internal/reserve", post(reserve))
        .route("/internal/confirm/{reference_id}", post(confirm))
        .route("/internal/cancel/{reference_id}", post(cancel))
        .route("/internal/check", get(check))
        .route("/internal/reservations/{reference_id}", get(get_reservation))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `reserve`.
#[derive(Debug, Deserialize)]
pub struct ReserveBody {
    /// Requester.
    pub user_id: Uuid,
    /// Leave request id.
    pub reference_id: String,
    /// Balance type code.
    pub balance_type: String,
    /// Amount to hold.
    pub amount: Decimal,
    /// Wallet year; the current year when absent.
    pub year: Option<i32>,
    /// End of the hold; `ttl_hours` from now when absent.
    pub expires_at: Option<DateTime<Utc>>,
    /// Lifetime of the hold; the configured default when absent.
    pub ttl_hours: Option<i64>,
}

/// Result of `reserve`.
#[derive(Debug, Serialize)]
pub struct ReserveResponse {
    /// False when the reference already held this reservation.
    pub created: bool,
    /// The hold.
    pub reservation: LeaveReservation,
}

/// Optional acting user of `confirm`.
#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    /// Approver, recorded on the usage lines.
    pub actor: Option<Uuid>,
}

/// Result of `confirm` and `cancel`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionResponse {
    /// Reservation confirmed.
    Confirmed {
        /// Confirmed reservation.
        reservation: LeaveReservation,
        /// New usage posting; absent when the usage already existed.
        posting: Option<Posting<LeaveBalanceType>>,
    },
    /// Reservation released.
    Cancelled {
        /// Released reservation.
        reservation: LeaveReservation,
    },
    /// Latest reservation of the reference was no longer pending.
    AlreadyResolved {
        /// That reservation.
        reservation: LeaveReservation,
    },
    /// The reference never reserved anything.
    NoReservation,
}

impl From<ConfirmOutcome<LeaveBalanceType>> for ResolutionResponse {
    fn from(outcome: ConfirmOutcome<LeaveBalanceType>) -> Self {
        match outcome {
            ConfirmOutcome::Confirmed { reservation, posting } => Self::Confirmed { reservation, posting },
            ConfirmOutcome::AlreadyResolved(reservation) => Self::AlreadyResolved { reservation },
            ConfirmOutcome::NoReservation => Self::NoReservation,
        }
    }
}

impl From<CancelOutcome<LeaveBalanceType>> for ResolutionResponse {
    fn from(outcome: CancelOutcome<LeaveBalanceType>) -> Self {
        match outcome {
            CancelOutcome::Cancelled(reservation) => Self::Cancelled { reservation },
            CancelOutcome::AlreadyResolved(reservation) => Self::AlreadyResolved { reservation },
            CancelOutcome::NoReservation => Self::NoReservation,
        }
    }
}

/// Query of the sufficiency check.
#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    /// Requester.
    pub user_id: Uuid,
    /// Balance type code.
    pub balance_type: String,
    /// Amount the request needs.
    pub amount: Decimal,
    /// Wallet year; the current year when absent.
    pub year: Option<i32>,
}

/// Result of the sufficiency check.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    /// True when `available >= amount`.
    pub sufficient: bool,
    /// Balance minus active reservations.
    #[serde(with = "rust_decimal::serde::float")]
    pub available: Decimal,
}

/// Validates a `reserve` body into a request for the wallet of its year.
pub fn reserve_request(
    body: ReserveBody,
    default_ttl_hours: i64,
    now: DateTime<Utc>,
) -> Result<(UserId, i32, ReserveRequest<LeaveBalanceType>), WalletError> {
    let balance_type: LeaveBalanceType = body.balance_type.parse()?;
    check_positive(balance_type, body.amount)?;
    if body.reference_id.trim().is_empty() {
        return Err(WalletError::EmptyReference);
    }
    let year = check_year(body.year.unwrap_or_else(|| now.year()))?;
    let expires_at = match body.expires_at {
        Some(expires_at) => expires_at,
        None => hold_deadline(now, body.ttl_hours.unwrap_or(default_ttl_hours))?,
    };
    if expires_at <= now {
        return Err(WalletError::InvalidExpiry);
    }

    Ok((
        UserId::from_uuid(body.user_id),
        year,
        ReserveRequest {
            reference_id: body.reference_id,
            balance_type,
            amount: body.amount,
            expires_at,
        },
    ))
}

/// `now` plus a positive number of hours, without overflowing.
fn hold_deadline(now: DateTime<Utc>, ttl_hours: i64) -> Result<DateTime<Utc>, WalletError> {
    if ttl_hours <= 0 {
        return Err(WalletError::InvalidExpiry);
    }
    Duration::try_hours(ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or(WalletError::InvalidExpiry)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/internal/reserve` - Holds balance for a leave request.
///
/// Answers 201 for a new hold and 200 when the reference already held one.
async fn reserve(State(state): State<AppState>, Json(body): Json<ReserveBody>) -> Response {
    let now = Utc::now();
    let (user_id, year, request) =
        match reserve_request(body, state.ledger.reservation_ttl_hours, now) {
            Ok(parts) => parts,
            Err(e) => return wallet_error(&e),
        };

    let wallets = WalletRepository::new((*state.db).clone());
    match wallets.reserve(user_id, year, request, now).await {
        Ok(outcome) => {
            let created = outcome.is_created();
            let reservation = match outcome {
                ReserveOutcome::Created(r) | ReserveOutcome::Existing(r) => r,
            };
            let status = if created { StatusCode::CREATED } else { StatusCode::OK };
            (status, Json(ReserveResponse { created, reservation })).into_response()
        }
        Err(e) => repository_error(&e),
    }
}

/// POST `/internal/confirm/{reference_id}` - Turns the hold into a usage.
async fn confirm(
    State(state): State<AppState>,
    Path(reference_id): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> Response {
    let wallets = WalletRepository::new((*state.db).clone());
    match wallets
        .confirm(&reference_id, query.actor.map(UserId::from_uuid), Utc::now())
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(ResolutionResponse::from(outcome))).into_response(),
        Err(e) => repository_error(&e),
    }
}

/// POST `/internal/cancel/{reference_id}` - Releases the hold.
async fn cancel(State(state): State<AppState>, Path(reference_id): Path<String>) -> Response {
    let wallets = WalletRepository::new((*state.db).clone());
    match wallets.cancel(&reference_id, Utc::now()).await {
        Ok(outcome) => (StatusCode::OK, Json(ResolutionResponse::from(outcome))).into_response(),
        Err(e) => repository_error(&e),
    }
}

/// GET `/internal/check` - Whether a request for `amount` would fit now.
async fn check(State(state): State<AppState>, Query(query): Query<CheckQuery>) -> Response {
    let now = Utc::now();
    let balance_type = match parse_balance_type(&query.balance_type) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    if let Err(e) = check_positive(balance_type, query.amount) {
        return wallet_error(&e);
    }
    let year = match resolve_year(query.year, now) {
        Ok(year) => year,
        Err(response) => return response,
    };

    let wallets = WalletRepository::new((*state.db).clone());
    match wallets
        .available(UserId::from_uuid(query.user_id), year, balance_type, now)
        .await
    {
        Ok(available) => (
            StatusCode::OK,
            Json(CheckResponse {
                sufficient: available >= query.amount,
                available,
            }),
        )
            .into_response(),
        Err(e) => repository_error(&e),
    }
}

/// GET `/internal/reservations/{reference_id}` - Latest reservation of a reference.
async fn get_reservation(State(state): State<AppState>, Path(reference_id): Path<String>) -> Response {
    let reservations = ReservationRepository::new((*state.db).clone());
    match reservations.latest(&reference_id).await {
        Ok(Some(reservation)) => (StatusCode::OK, Json(reservation)).into_response(),
        Ok(None) => wallet_error(&WalletError::ReservationNotFound(reference_id)),
        Err(e) => repository_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{assert_error, get, post_json};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 9, 0, 0).unwrap()
    }

    fn body(amount: Decimal) -> ReserveBody {
        ReserveBody {
            user_id: Uuid::new_v4(),
            reference_id: "lr-9".into(),
            balance_type: "vacation".into(),
            amount,
            year: None,
            expires_at: None,
            ttl_hours: None,
        }
    }

    #[test]
    fn test_reserve_defaults_year_and_ttl() {
        let (_, year, request) = reserve_request(body(dec!(2)), 72, now()).unwrap();
        assert_eq!(year, 2025);
        assert_eq!(request.expires_at, now() + Duration::hours(72));
        assert_eq!(request.balance_type, LeaveBalanceType::Vacation);
    }

    #[test]
    fn test_reserve_explicit_ttl_wins() {
        let mut b = body(dec!(2));
        b.ttl_hours = Some(1);
        b.year = Some(2026);
        let (_, year, request) = reserve_request(b, 72, now()).unwrap();
        assert_eq!(year, 2026);
        assert_eq!(request.expires_at, now() + Duration::hours(1));
    }

    #[test]
    fn test_reserve_rejects_past_expiry() {
        let mut b = body(dec!(2));
        b.expires_at = Some(now() - Duration::minutes(1));
        assert!(matches!(reserve_request(b, 72, now()), Err(WalletError::InvalidExpiry)));
    }

    #[test]
    fn test_reserve_rejects_unusable_ttl() {
        for ttl_hours in [0, -5, i64::MAX] {
            let mut b = body(dec!(2));
            b.ttl_hours = Some(ttl_hours);
            assert!(matches!(reserve_request(b, 72, now()), Err(WalletError::InvalidExpiry)));
        }
        // hours that fit a Duration but overflow the calendar
        let mut b = body(dec!(2));
        b.ttl_hours = Some(i64::MAX / 3_600_000);
        assert!(matches!(reserve_request(b, 72, now()), Err(WalletError::InvalidExpiry)));
    }

    #[tokio::test]
    async fn test_reserve_huge_ttl_is_bad_request() {
        let body = format!(
            r#"{{"user_id":"{}","reference_id":"lr-1","balance_type":"rol","amount":"4","ttl_hours":{}}}"#,
            Uuid::new_v4(),
            i64::MAX
        );
        assert_error(post_json("/internal/reserve", &body).await, StatusCode::BAD_REQUEST, "INVALID_EXPIRY").await;
    }

    #[test]
    fn test_reserve_rejects_bad_amounts() {
        assert!(matches!(
            reserve_request(body(dec!(0)), 72, now()),
            Err(WalletError::NonPositiveAmount(_))
        ));
        assert!(matches!(
            reserve_request(body(dec!(0.25)), 72, now()),
            Err(WalletError::InvalidPrecision { .. })
        ));
    }

    #[test]
    fn test_resolution_serializes_status_tag() {
        let json = serde_json::to_value(ResolutionResponse::NoReservation).unwrap();
        assert_eq!(json["status"], "no_reservation");
    }

    #[tokio::test]
    async fn test_reserve_blank_reference_rejected() {
        let body = format!(
            r#"{{"user_id":"{}","reference_id":" ","balance_type":"rol","amount":"4"}}"#,
            Uuid::new_v4()
        );
        assert_error(post_json("/internal/reserve", &body).await, StatusCode::BAD_REQUEST, "EMPTY_REFERENCE").await;
    }

    #[tokio::test]
    async fn test_check_rejects_non_positive_amount() {
        let uri = format!("/internal/check?user_id={}&balance_type=rol&amount=0", Uuid::new_v4());
        assert_error(get(&uri).await, StatusCode::BAD_REQUEST, "NON_POSITIVE_AMOUNT").await;
    }

    #[tokio::test]
    async fn test_check_requires_parameters() {
        let response = get("/internal/check?balance_type=rol").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_confirm_storage_failure() {
        let response = post_json("/internal/confirm/lr-1", "").await;
        assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR").await;
    }
}
