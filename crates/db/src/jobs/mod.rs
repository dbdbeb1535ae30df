//! Batch jobs over all wallets.
//!
//! Jobs iterate users independently: each user runs in its own wallet
//! transaction, and a failing user is logged and counted without rolling back
//! the others. Only a datastore-level failure aborts a run.

pub mod accrual;
pub mod reconciliation;
pub mod rollover;

pub use accrual::{AccrualJob, AccrualSummary};
pub use reconciliation::{ReconciliationJob, ReconciliationOptions};
pub use rollover::{RolloverJob, RolloverSummary};

use crate::repositories::RepositoryError;

/// True when a per-user failure must abort the whole batch.
const fn aborts_batch(err: &RepositoryError) -> bool {
    matches!(err, RepositoryError::Database(_))
}
