//! Conversions between database rows and core domain types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use saldo_core::balance::LeaveBalanceType;
use saldo_core::ledger::{
    LeaveCounters, LeaveEntry, LeaveReservation, LeaveWallet, LedgerEntryType, Reference,
    ReferenceType, WalletError, WalletPatch, WalletStatus,
};
use saldo_core::reservation::ReservationStatus;
use saldo_shared::types::{LedgerEntryId, PostingId, ReservationId, UserId, WalletId};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::{NotSet, Set};

use crate::entities::{
    balance_reservations, sea_orm_active_enums as db_enums, wallet_ledger_entries, wallets,
};

fn utc(at: DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

fn parse_bucket(code: &str) -> Result<LeaveBalanceType, WalletError> {
    LeaveBalanceType::from_str(code)
}

// ========== Enums ==========

/// Core wallet status from the column value.
#[must_use]
pub const fn wallet_status(status: db_enums::WalletStatus) -> WalletStatus {
    match status {
        db_enums::WalletStatus::Active => WalletStatus::Active,
        db_enums::WalletStatus::Closed => WalletStatus::Closed,
    }
}

/// Column value of a core wallet status.
#[must_use]
pub const fn db_wallet_status(status: WalletStatus) -> db_enums::WalletStatus {
    match status {
        WalletStatus::Active => db_enums::WalletStatus::Active,
        WalletStatus::Closed => db_enums::WalletStatus::Closed,
    }
}

/// Core entry type from the column value.
#[must_use]
pub const fn entry_type(entry_type: db_enums::LedgerEntryType) -> LedgerEntryType {
    match entry_type {
        db_enums::LedgerEntryType::Accrual => LedgerEntryType::Accrual,
        db_enums::LedgerEntryType::Usage => LedgerEntryType::Usage,
        db_enums::LedgerEntryType::AdjustmentAdd => LedgerEntryType::AdjustmentAdd,
        db_enums::LedgerEntryType::CarryOver => LedgerEntryType::CarryOver,
        db_enums::LedgerEntryType::Reservation => LedgerEntryType::Reservation,
        db_enums::LedgerEntryType::Reversal => LedgerEntryType::Reversal,
    }
}

/// Column value of a core entry type.
#[must_use]
pub const fn db_entry_type(entry_type: LedgerEntryType) -> db_enums::LedgerEntryType {
    match entry_type {
        LedgerEntryType::Accrual => db_enums::LedgerEntryType::Accrual,
        LedgerEntryType::Usage => db_enums::LedgerEntryType::Usage,
        LedgerEntryType::AdjustmentAdd => db_enums::LedgerEntryType::AdjustmentAdd,
        LedgerEntryType::CarryOver => db_enums::LedgerEntryType::CarryOver,
        LedgerEntryType::Reservation => db_enums::LedgerEntryType::Reservation,
        LedgerEntryType::Reversal => db_enums::LedgerEntryType::Reversal,
    }
}

/// Core reservation status from the column value.
#[must_use]
pub const fn reservation_status(status: db_enums::ReservationStatus) -> ReservationStatus {
    match status {
        db_enums::ReservationStatus::Pending => ReservationStatus::Pending,
        db_enums::ReservationStatus::Confirmed => ReservationStatus::Confirmed,
        db_enums::ReservationStatus::Cancelled => ReservationStatus::Cancelled,
        db_enums::ReservationStatus::Expired => ReservationStatus::Expired,
    }
}

/// Column value of a core reservation status.
#[must_use]
pub const fn db_reservation_status(status: ReservationStatus) -> db_enums::ReservationStatus {
    match status {
        ReservationStatus::Pending => db_enums::ReservationStatus::Pending,
        ReservationStatus::Confirmed => db_enums::ReservationStatus::Confirmed,
        ReservationStatus::Cancelled => db_enums::ReservationStatus::Cancelled,
        ReservationStatus::Expired => db_enums::ReservationStatus::Expired,
    }
}

// ========== Wallets ==========

/// Named columns of a wallet row.
#[must_use]
pub fn counters(model: &wallets::Model) -> LeaveCounters {
    LeaveCounters {
        vacation_previous_year: model.vacation_previous_year.normalize(),
        vacation_current_year: model.vacation_current_year.normalize(),
        vacation_accrued: model.vacation_accrued.normalize(),
        vacation_used_ap: model.vacation_used_ap.normalize(),
        vacation_used_ac: model.vacation_used_ac.normalize(),
        rol_previous_year: model.rol_previous_year.normalize(),
        rol_accrued: model.rol_accrued.normalize(),
        rol_used: model.rol_used.normalize(),
        permits_total: model.permits_total.normalize(),
        permits_used: model.permits_used.normalize(),
        ap_expiry_date: model.ap_expiry_date,
        status: wallet_status(model.status),
    }
}

/// Domain wallet of a row.
#[must_use]
pub fn wallet(model: &wallets::Model) -> LeaveWallet {
    counters(model).into_wallet(
        WalletId::from_uuid(model.id),
        UserId::from_uuid(model.user_id),
        model.year,
    )
}

/// Update of the columns a patch touches; other columns stay `NotSet`.
#[must_use]
pub fn patch_model(id: WalletId, patch: &WalletPatch, now: DateTime<Utc>) -> wallets::ActiveModel {
    fn column<T: Into<sea_orm::Value>>(value: Option<T>) -> sea_orm::ActiveValue<T> {
        value.map_or(NotSet, Set)
    }

    wallets::ActiveModel {
        id: sea_orm::ActiveValue::Unchanged(id.into_inner()),
        vacation_previous_year: column(patch.vacation_previous_year),
        vacation_current_year: column(patch.vacation_current_year),
        vacation_accrued: column(patch.vacation_accrued),
        vacation_used_ap: column(patch.vacation_used_ap),
        vacation_used_ac: column(patch.vacation_used_ac),
        rol_previous_year: column(patch.rol_previous_year),
        rol_accrued: column(patch.rol_accrued),
        rol_used: column(patch.rol_used),
        permits_total: column(patch.permits_total),
        permits_used: column(patch.permits_used),
        ap_expiry_date: column(patch.ap_expiry_date),
        status: column(patch.status.map(db_wallet_status)),
        updated_at: Set(now.into()),
        ..Default::default()
    }
}

// ========== Ledger ==========

/// Domain line of a ledger row.
///
/// # Errors
///
/// Returns an error if the row holds an unknown balance or reference type.
pub fn entry(model: &wallet_ledger_entries::Model) -> Result<LeaveEntry, WalletError> {
    let reference = match (&model.reference_type, &model.reference_id) {
        (Some(reference_type), Some(reference_id)) => {
            let reference_type = ReferenceType::parse(reference_type).ok_or_else(|| {
                WalletError::Internal(format!("unknown reference type {reference_type}"))
            })?;
            Some(Reference {
                reference_type,
                reference_id: reference_id.clone(),
                status: model.reference_status.clone(),
            })
        }
        _ => None,
    };

    Ok(LeaveEntry {
        id: LedgerEntryId::from_uuid(model.id),
        wallet_id: WalletId::from_uuid(model.wallet_id),
        year: model.year,
        posting_id: PostingId::from_uuid(model.posting_id),
        entry_type: entry_type(model.entry_type),
        balance_type: parse_bucket(&model.balance_type)?,
        amount: model.amount.normalize(),
        remaining_amount: model.remaining_amount.normalize(),
        reference,
        expiry_date: model.expiry_date,
        description: model.description.clone(),
        created_by: model.created_by.map(UserId::from_uuid),
        created_at: utc(model.created_at),
    })
}

/// Insert model of a new ledger line.
#[must_use]
pub fn entry_model(entry: &LeaveEntry) -> wallet_ledger_entries::ActiveModel {
    let reference = entry.reference.as_ref();
    wallet_ledger_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        wallet_id: Set(entry.wallet_id.into_inner()),
        year: Set(entry.year),
        posting_id: Set(entry.posting_id.into_inner()),
        entry_type: Set(db_entry_type(entry.entry_type)),
        balance_type: Set(entry.balance_type.to_string()),
        amount: Set(entry.amount),
        remaining_amount: Set(entry.remaining_amount),
        reference_type: Set(reference.map(|r| r.reference_type.as_str().to_string())),
        reference_id: Set(reference.map(|r| r.reference_id.clone())),
        reference_status: Set(reference.and_then(|r| r.status.clone())),
        expiry_date: Set(entry.expiry_date),
        description: Set(entry.description.clone()),
        created_by: Set(entry.created_by.map(UserId::into_inner)),
        created_at: Set(entry.created_at.into()),
    }
}

// ========== Reservations ==========

/// Domain reservation of a row.
///
/// # Errors
///
/// Returns an error if the row holds an unknown balance type.
pub fn reservation(model: &balance_reservations::Model) -> Result<LeaveReservation, WalletError> {
    Ok(LeaveReservation {
        id: ReservationId::from_uuid(model.id),
        wallet_id: WalletId::from_uuid(model.wallet_id),
        user_id: UserId::from_uuid(model.user_id),
        year: model.year,
        leave_request_id: model.leave_request_id.clone(),
        balance_type: parse_bucket(&model.balance_type)?,
        amount: model.amount.normalize(),
        status: reservation_status(model.status),
        expires_at: utc(model.expires_at),
        posting_id: model.posting_id.map(PostingId::from_uuid),
        created_at: utc(model.created_at),
        resolved_at: model.resolved_at.map(utc),
    })
}

/// Insert model of a new reservation.
#[must_use]
pub fn reservation_model(reservation: &LeaveReservation) -> balance_reservations::ActiveModel {
    balance_reservations::ActiveModel {
        id: Set(reservation.id.into_inner()),
        wallet_id: Set(reservation.wallet_id.into_inner()),
        user_id: Set(reservation.user_id.into_inner()),
        year: Set(reservation.year),
        leave_request_id: Set(reservation.leave_request_id.clone()),
        balance_type: Set(reservation.balance_type.to_string()),
        amount: Set(reservation.amount),
        status: Set(db_reservation_status(reservation.status)),
        expires_at: Set(reservation.expires_at.into()),
        posting_id: Set(reservation.posting_id.map(PostingId::into_inner)),
        created_at: Set(reservation.created_at.into()),
        resolved_at: Set(reservation.resolved_at.map(Into::into)),
    }
}
