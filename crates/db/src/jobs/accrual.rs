//! Accrual job: brings every employee's accrual buckets to their target.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use saldo_core::accrual::{
    AccrualCalculator, AgreementVersion, ContractDirectory, DirectoryError, EmployeeContract,
};
use saldo_core::ledger::WalletError;
use saldo_shared::types::UserId;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{error, info, warn};

use super::aborts_batch;
use crate::repositories::{RepositoryError, WalletRepository};

/// Outcome of an accrual run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccrualSummary {
    /// Accrued year.
    pub year: i32,
    /// Last accrued month.
    pub through_month: u32,
    /// Employees considered.
    pub users: usize,
    /// Employees whose buckets moved.
    pub accrued: usize,
    /// Employees already at target.
    pub unchanged: usize,
    /// Employees skipped for missing contract data.
    pub skipped: usize,
    /// Employees whose posting failed.
    pub failed: usize,
    /// Ledger postings written.
    pub postings: usize,
}

enum UserResult {
    Accrued(usize),
    Unchanged,
    Skipped,
}

/// Runs the accrual calculator for every employee of the contract directory.
pub struct AccrualJob {
    wallets: WalletRepository,
    directory: Arc<dyn ContractDirectory>,
}

impl AccrualJob {
    /// Creates the job.
    #[must_use]
    pub fn new(db: DatabaseConnection, directory: Arc<dyn ContractDirectory>) -> Self {
        Self {
            wallets: WalletRepository::new(db),
            directory,
        }
    }

    /// Accrues January through `through_month` of `year` for every employee.
    ///
    /// # Errors
    ///
    /// Returns an error when the employee list cannot be fetched or the
    /// database fails; per-employee problems are counted in the summary.
    pub async fn run(
        &self,
        year: i32,
        through_month: u32,
        now: DateTime<Utc>,
    ) -> Result<AccrualSummary, RepositoryError> {
        let users = self
            .directory
            .employees(year)
            .await
            .map_err(WalletError::from)?;

        let mut summary = AccrualSummary {
            year,
            through_month,
            users: users.len(),
            ..AccrualSummary::default()
        };
        info!(year, through_month, users = users.len(), "Starting accrual run");

        for user_id in users {
            match self.accrue_user(user_id, year, through_month, now).await {
                Ok(UserResult::Accrued(postings)) => {
                    summary.accrued += 1;
                    summary.postings += postings;
                }
                Ok(UserResult::Unchanged) => summary.unchanged += 1,
                Ok(UserResult::Skipped) => summary.skipped += 1,
                Err(err) if aborts_batch(&err) => return Err(err),
                Err(err) => {
                    error!(user_id = %user_id, year, error = %err, "Accrual failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            year,
            through_month,
            accrued = summary.accrued,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            failed = summary.failed,
            "Accrual run finished"
        );
        Ok(summary)
    }

    async fn accrue_user(
        &self,
        user_id: UserId,
        year: i32,
        through_month: u32,
        now: DateTime<Utc>,
    ) -> Result<UserResult, RepositoryError> {
        let (contracts, versions) = match self.contract_data(user_id, year).await {
            Ok(data) => data,
            Err(err) => {
                warn!(user_id = %user_id, year, error = %err, "Contract service unavailable, skipping user");
                return Ok(UserResult::Skipped);
            }
        };

        let target = match AccrualCalculator::target(&contracts, &versions, year, through_month) {
            Ok(target) => target,
            Err(skip) => {
                warn!(user_id = %user_id, year, reason = %skip, "Skipping accrual");
                return Ok(UserResult::Skipped);
            }
        };

        let outcomes = self
            .wallets
            .with_book(user_id, year, now, |book| {
                let plan = AccrualCalculator::plan(book, target);
                AccrualCalculator::apply(book, &plan, now)
            })
            .await?;

        let postings = outcomes.iter().filter(|o| o.is_posted()).count();
        if postings == 0 {
            return Ok(UserResult::Unchanged);
        }
        info!(user_id = %user_id, year, through_month, postings, "Accrual posted");
        Ok(UserResult::Accrued(postings))
    }

    async fn contract_data(
        &self,
        user_id: UserId,
        year: i32,
    ) -> Result<(Vec<EmployeeContract>, Vec<AgreementVersion>), DirectoryError> {
        let contracts = self.directory.contracts(user_id, year).await?;
        let agreements: BTreeSet<_> = contracts.iter().filter_map(|c| c.agreement_id).collect();

        let mut versions = Vec::new();
        for agreement_id in agreements {
            versions.extend(self.directory.agreement_versions(agreement_id).await?);
        }
        Ok((contracts, versions))
    }
}
