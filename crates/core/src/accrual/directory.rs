//! The contract / labor-agreement configuration service, as seen by the core.

use async_trait::async_trait;
use saldo_shared::types::{AgreementId, UserId};
use thiserror::Error;

use super::contract::{AgreementVersion, EmployeeContract};
use crate::ledger::WalletError;

/// Failures of the contract directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The service did not answer in time.
    #[error("Contract service timed out")]
    Timeout,

    /// The service answered with an error status.
    #[error("Contract service returned status {0}")]
    Status(u16),

    /// The request could not be sent.
    #[error("Contract service unreachable: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("Invalid contract service response: {0}")]
    Decode(String),
}

impl From<DirectoryError> for WalletError {
    fn from(err: DirectoryError) -> Self {
        Self::ExternalService(err.to_string())
    }
}

/// Source of employees, contracts and agreement versions.
#[async_trait]
pub trait ContractDirectory: Send + Sync {
    /// Employees with a contract overlapping the year.
    async fn employees(&self, year: i32) -> Result<Vec<UserId>, DirectoryError>;

    /// Contracts of an employee overlapping the year.
    async fn contracts(&self, user_id: UserId, year: i32) -> Result<Vec<EmployeeContract>, DirectoryError>;

    /// Every version of a labor agreement.
    async fn agreement_versions(&self, agreement_id: AgreementId) -> Result<Vec<AgreementVersion>, DirectoryError>;
}
