//! Cross-checks between wallets, the ledger and the leave workflow.
//!
//! Four checks produce [`Anomaly`] records:
//!
//! | Check | Anomaly | Severity |
//! |---|---|---|
//! | approved, deducted request without usage | `MISSING_LEDGER_ENTRY` | HIGH |
//! | usage whose request is not approved | `ORPHAN_LEDGER_ENTRY` | MEDIUM |
//! | wallet columns differ from the ledger replay | `WALLET_LEDGER_DRIFT` | HIGH |
//! | bucket remaining differs from bucket balance | `BUCKET_REMAINING_DRIFT` | LOW |
//!
//! Anomalies are findings, not errors. Only the first and third are repairable.

pub mod anomaly;
pub mod detector;
pub mod source;

pub use anomaly::{Anomaly, AnomalyType, EntityType, ReconciliationReport, Severity};
pub use detector::{AUTO_FIX_DESCRIPTION, ReconciliationCheck, UsageRef};
pub use source::{LeaveRequestRecord, LeaveRequestSource, SourceError, map_leave_type};
