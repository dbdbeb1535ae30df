//! Core wallet and ledger logic for Saldo.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `balance` - Balance-type enums and decimal precision rules
//! - `ledger` - Generic ledger engine (entries, counters, wallet book)
//! - `bucket` - FIFO consumption of additive ledger entries
//! - `reservation` - Balance holds and their state machine
//! - `accrual` - Monthly pro-rata accrual from contract terms
//! - `reconciliation` - Wallet/ledger/workflow cross-checks
//! - `rollover` - Year-end carry-over planning

pub mod accrual;
pub mod balance;
pub mod bucket;
pub mod ledger;
pub mod reconciliation;
pub mod reservation;
pub mod rollover;
