//! The leave-request workflow, as seen by reconciliation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::balance::LeaveBalanceType;
use crate::ledger::WalletError;

/// Failures of the leave-request service.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The service did not answer in time.
    #[error("Leave-request service timed out")]
    Timeout,

    /// The service answered with an error status.
    #[error("Leave-request service returned status {0}")]
    Status(u16),

    /// The request could not be sent.
    #[error("Leave-request service unreachable: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("Invalid leave-request service response: {0}")]
    Decode(String),
}

impl From<SourceError> for WalletError {
    fn from(err: SourceError) -> Self {
        Self::ExternalService(err.to_string())
    }
}

/// A leave request as exposed by the workflow service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequestRecord {
    /// Request id, used as ledger reference.
    pub id: String,
    /// Requester.
    pub user_id: UserId,
    /// Workflow leave-type code (`FERIE`, `ROL`, ...).
    pub leave_type: String,
    /// Workflow status (`APPROVED`, `CANCELLED`, ...).
    pub status: String,
    /// First day of leave.
    pub start_date: NaiveDate,
    /// Days requested.
    pub days_requested: Decimal,
    /// Hours requested, for hour-based types.
    pub hours_requested: Option<Decimal>,
    /// Whether the workflow believes the balance was deducted.
    pub balance_deducted: bool,
    /// Approval time.
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl LeaveRequestRecord {
    /// Wallet year the request belongs to.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.start_date.year()
    }

    /// True for approved requests.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status.eq_ignore_ascii_case(crate::ledger::APPROVED_STATUS)
    }

    /// Balance type the leave type draws from.
    #[must_use]
    pub fn balance_type(&self) -> Option<LeaveBalanceType> {
        map_leave_type(&self.leave_type)
    }

    /// Amount to deduct: hours for hour-based types when present, days otherwise.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        match self.balance_type() {
            Some(LeaveBalanceType::Rol | LeaveBalanceType::Permits) => {
                self.hours_requested.unwrap_or(self.days_requested)
            }
            _ => self.days_requested,
        }
    }

    /// Time used to process repairs oldest first.
    #[must_use]
    pub fn ordering_time(&self) -> DateTime<Utc> {
        self.approved_at.unwrap_or(self.created_at)
    }
}

/// Maps a workflow leave-type code to the balance it draws from.
#[must_use]
pub fn map_leave_type(code: &str) -> Option<LeaveBalanceType> {
    match code.trim().to_ascii_uppercase().as_str() {
        "FERIE" | "VACATION" => Some(LeaveBalanceType::Vacation),
        "ROL" => Some(LeaveBalanceType::Rol),
        "PERMESSO" | "PERMIT" | "EX_FESTIVITA" => Some(LeaveBalanceType::Permits),
        _ => None,
    }
}

/// Source of leave requests.
#[async_trait]
pub trait LeaveRequestSource: Send + Sync {
    /// Approved requests the workflow marked as deducted.
    async fn approved_with_deduction(&self) -> Result<Vec<LeaveRequestRecord>, SourceError>;

    /// Current status of each request id; unknown ids are absent.
    async fn statuses(&self, ids: &[String]) -> Result<HashMap<String, String>, SourceError>;
}
