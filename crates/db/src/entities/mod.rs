//! `SeaORM` entities.

pub mod balance_reservations;
pub mod sea_orm_active_enums;
pub mod wallet_ledger_entries;
pub mod wallets;
