//! Rollover job: carries unused balances of one year into the next.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use saldo_core::accrual::{AccrualCalculator, ContractDirectory};
use saldo_core::balance::LeaveBalanceType;
use saldo_core::ledger::WalletError;
use saldo_core::rollover::RolloverPlanner;
use saldo_shared::types::UserId;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{error, info, warn};

use super::aborts_batch;
use crate::repositories::{RepositoryError, WalletRepository};

/// Outcome of a rollover run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RolloverSummary {
    /// Source year.
    pub from_year: i32,
    /// Wallets of the source year.
    pub wallets: usize,
    /// Wallets rolled over by this run.
    pub rolled: usize,
    /// Wallets already rolled over.
    pub already_rolled: usize,
    /// Wallets whose rollover failed.
    pub failed: usize,
    /// Vacation days carried.
    pub vacation_carried: Decimal,
    /// ROL hours carried.
    pub rol_carried: Decimal,
}

/// Rolls every wallet of a year over into the following year.
pub struct RolloverJob {
    wallets: WalletRepository,
    directory: Option<Arc<dyn ContractDirectory>>,
    default_months: u32,
}

impl RolloverJob {
    /// Creates the job.
    ///
    /// `default_months` applies when no agreement version in force on 31
    /// December names a carry-over window, or when no directory is given.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        directory: Option<Arc<dyn ContractDirectory>>,
        default_months: u32,
    ) -> Self {
        Self {
            wallets: WalletRepository::new(db),
            directory,
            default_months,
        }
    }

    /// Rolls over every wallet of `from_year`.
    ///
    /// Re-running is a no-op for wallets already rolled over.
    ///
    /// # Errors
    ///
    /// Returns an error only when the database fails.
    pub async fn run(&self, from_year: i32, now: DateTime<Utc>) -> Result<RolloverSummary, RepositoryError> {
        let users = self.wallets.users_for_year(from_year).await?;
        let mut summary = RolloverSummary {
            from_year,
            wallets: users.len(),
            ..RolloverSummary::default()
        };
        info!(from_year, wallets = users.len(), "Starting rollover");

        for user_id in users {
            let months = self.carryover_months(user_id, from_year).await;
            let result = self
                .wallets
                .with_year_pair(user_id, from_year, now, |source, target| {
                    let plan = RolloverPlanner::plan(source, target, months)?;
                    RolloverPlanner::apply(source, target, &plan, now)?;
                    Ok(plan)
                })
                .await;

            match result {
                Ok(plan) => {
                    let vacation = plan.amount(LeaveBalanceType::VacationAp);
                    let rol = plan.amount(LeaveBalanceType::Rol);
                    info!(
                        user_id = %user_id,
                        from_year,
                        vacation = %vacation,
                        rol = %rol,
                        expiry = ?plan.expiry_date,
                        "Wallet rolled over"
                    );
                    summary.rolled += 1;
                    summary.vacation_carried += vacation;
                    summary.rol_carried += rol;
                }
                Err(RepositoryError::Wallet(WalletError::DuplicateRollover { .. })) => {
                    info!(user_id = %user_id, from_year, "Already rolled over, nothing to do");
                    summary.already_rolled += 1;
                }
                Err(err) if aborts_batch(&err) => return Err(err),
                Err(err) => {
                    error!(user_id = %user_id, from_year, error = %err, "Rollover failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            from_year,
            rolled = summary.rolled,
            already_rolled = summary.already_rolled,
            failed = summary.failed,
            "Rollover finished"
        );
        Ok(summary)
    }

    async fn carryover_months(&self, user_id: UserId, from_year: i32) -> u32 {
        let Some(directory) = &self.directory else {
            return self.default_months;
        };
        let contracts = match directory.contracts(user_id, from_year).await {
            Ok(contracts) => contracts,
            Err(err) => {
                warn!(user_id = %user_id, from_year, error = %err, "Contract service unavailable, using default carry-over window");
                return self.default_months;
            }
        };

        let mut versions = Vec::new();
        for agreement_id in contracts.iter().filter_map(|c| c.agreement_id) {
            match directory.agreement_versions(agreement_id).await {
                Ok(found) => versions.extend(found),
                Err(err) => {
                    warn!(user_id = %user_id, %agreement_id, error = %err, "Agreement versions unavailable");
                }
            }
        }
        AccrualCalculator::carryover_months(&contracts, &versions, from_year)
            .unwrap_or(self.default_months)
    }
}
