//! `SeaORM` Entity for wallets table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::WalletStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub year: i32,
    pub vacation_previous_year: Decimal,
    pub vacation_current_year: Decimal,
    pub vacation_accrued: Decimal,
    pub vacation_used_ap: Decimal,
    pub vacation_used_ac: Decimal,
    pub rol_previous_year: Decimal,
    pub rol_accrued: Decimal,
    pub rol_used: Decimal,
    pub permits_total: Decimal,
    pub permits_used: Decimal,
    pub ap_expiry_date: Option<Date>,
    pub status: WalletStatus,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wallet_ledger_entries::Entity")]
    WalletLedgerEntries,
    #[sea_orm(has_many = "super::balance_reservations::Entity")]
    BalanceReservations,
}

impl Related<super::wallet_ledger_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WalletLedgerEntries.def()
    }
}

impl Related<super::balance_reservations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BalanceReservations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
