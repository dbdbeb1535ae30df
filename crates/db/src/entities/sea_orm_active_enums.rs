//! `SeaORM` active enums mirroring the `PostgreSQL` enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "wallet_status")]
pub enum WalletStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ledger_entry_type")]
pub enum LedgerEntryType {
    #[sea_orm(string_value = "ACCRUAL")]
    Accrual,
    #[sea_orm(string_value = "USAGE")]
    Usage,
    #[sea_orm(string_value = "ADJUSTMENT_ADD")]
    AdjustmentAdd,
    #[sea_orm(string_value = "CARRY_OVER")]
    CarryOver,
    #[sea_orm(string_value = "RESERVATION")]
    Reservation,
    #[sea_orm(string_value = "REVERSAL")]
    Reversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "reservation_status")]
pub enum ReservationStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
}
