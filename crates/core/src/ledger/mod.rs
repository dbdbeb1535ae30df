//! Generic wallet ledger engine.
//!
//! This module implements the wallet and ledger functionality:
//! - Ledger entries (append-only, one line per bucket)
//! - Per-bucket counters and ledger replay
//! - The wallet book: postings, FIFO consumption, reservations
//! - Transaction requests and posting results
//! - Leave projection onto named wallet columns and typed patches
//! - Error types for wallet operations

pub mod book;
pub mod entry;
pub mod error;
pub mod leave;
pub mod posting;
pub mod sheet;
pub mod wallet;

#[cfg(test)]
mod book_props;

pub use book::{APPROVED_STATUS, BookChanges, WalletBook, active_usage};
pub use entry::{LedgerEntry, LedgerEntryType, Reference, ReferenceType};
pub use error::{ErrorKind, WalletError};
pub use leave::{
    LeaveBook, LeaveCounters, LeaveEntry, LeaveReservation, LeaveWallet, WalletPatch,
    WalletSnapshot,
};
pub use posting::{
    Posting, PostingOutcome, PostingWarning, SufficiencyPolicy, TransactionRequest,
    TransactionType,
};
pub use sheet::{BalanceSheet, BucketCounters};
pub use wallet::{MAX_YEAR, MIN_YEAR, Wallet, WalletStatus, check_year};
