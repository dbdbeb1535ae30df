//! Reconciliation job: compares the ledger with the workflow and with itself.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use saldo_core::ledger::PostingOutcome;
use saldo_core::reconciliation::{
    Anomaly, LeaveRequestRecord, LeaveRequestSource, ReconciliationCheck, ReconciliationReport,
};
use saldo_shared::LedgerConfig;
use saldo_shared::types::UserId;
use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use super::aborts_batch;
use crate::repositories::{LedgerRepository, RepositoryError, WalletRepository};

/// Knobs of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationOptions {
    /// Repair what can be repaired.
    pub auto_fix: bool,
    /// Requests repaired per batch.
    pub batch_size: usize,
    /// Restricts the wallet checks to one year.
    pub year: Option<i32>,
}

impl ReconciliationOptions {
    /// Options from the ledger configuration, checking every year.
    #[must_use]
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            auto_fix: config.reconciliation_auto_fix,
            batch_size: config.reconciliation_batch_size,
            year: None,
        }
    }
}

impl Default for ReconciliationOptions {
    fn default() -> Self {
        Self {
            auto_fix: false,
            batch_size: 100,
            year: None,
        }
    }
}

/// Runs the four reconciliation checks and optionally repairs findings.
///
/// | Check | Anomaly | Repair |
/// |---|---|---|
/// | approved + deducted request, no usage | `MISSING_LEDGER_ENTRY` | post the usage |
/// | usage of a request not approved | `ORPHAN_LEDGER_ENTRY` | none |
/// | wallet columns differ from replay | `WALLET_LEDGER_DRIFT` | rewrite columns |
/// | remaining amounts differ from balance | `BUCKET_REMAINING_DRIFT` | none |
pub struct ReconciliationJob {
    wallets: WalletRepository,
    ledger: LedgerRepository,
    source: Arc<dyn LeaveRequestSource>,
}

impl ReconciliationJob {
    /// Creates the job.
    #[must_use]
    pub fn new(db: DatabaseConnection, source: Arc<dyn LeaveRequestSource>) -> Self {
        Self {
            wallets: WalletRepository::new(db.clone()),
            ledger: LedgerRepository::new(db),
            source,
        }
    }

    /// Runs every check.
    ///
    /// An unreachable workflow service disables the two request checks; the
    /// wallet checks still run.
    ///
    /// # Errors
    ///
    /// Returns an error only when the database fails.
    pub async fn run(
        &self,
        options: ReconciliationOptions,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationReport, RepositoryError> {
        let mut report = ReconciliationReport::default();
        info!(auto_fix = options.auto_fix, year = ?options.year, "Starting reconciliation");

        match self.source.approved_with_deduction().await {
            Ok(requests) => {
                report.requests_checked = requests.len();
                let missing = self.check_requests(&requests, &mut report, now).await?;
                if options.auto_fix {
                    self.fix_missing(&requests, &missing, options.batch_size, &mut report, now)
                        .await?;
                }
            }
            Err(err) => {
                warn!(error = %err, "Leave-request service unavailable, skipping request checks");
            }
        }

        self.check_wallets(options, &mut report, now).await?;

        let counts = report.counts();
        info!(
            anomalies = report.anomalies.len(),
            counts = ?counts,
            wallets_checked = report.wallets_checked,
            requests_checked = report.requests_checked,
            fixed = report.fixed,
            fix_failures = report.fix_failures,
            "Reconciliation finished"
        );
        Ok(report)
    }

    /// Checks 1 and 2. Returns the missing-entry findings.
    async fn check_requests(
        &self,
        requests: &[LeaveRequestRecord],
        report: &mut ReconciliationReport,
        now: DateTime<Utc>,
    ) -> Result<Vec<Anomaly>, RepositoryError> {
        let lines = self.ledger.leave_request_lines().await?;
        let usages = ReconciliationCheck::active_usages(&lines);
        let referenced: HashSet<String> = usages.iter().map(|u| u.reference_id.clone()).collect();

        let missing = ReconciliationCheck::missing_ledger_entries(requests, &referenced, now);
        for anomaly in &missing {
            warn!(request_id = %anomaly.entity_id, "Approved request without ledger usage");
        }
        report.extend(missing.iter().cloned());

        if usages.is_empty() {
            return Ok(missing);
        }
        let ids: Vec<String> = referenced.into_iter().collect();
        match self.source.statuses(&ids).await {
            Ok(statuses) => {
                let orphans = ReconciliationCheck::orphan_ledger_entries(&usages, &statuses, now);
                for anomaly in &orphans {
                    warn!(entry_id = %anomaly.entity_id, "Ledger usage without approved request");
                }
                report.extend(orphans);
            }
            Err(err) => {
                warn!(error = %err, "Cannot fetch request statuses, skipping orphan check");
            }
        }
        Ok(missing)
    }

    /// Re-derives missing usages, oldest request first, in bounded batches.
    async fn fix_missing(
        &self,
        requests: &[LeaveRequestRecord],
        missing: &[Anomaly],
        batch_size: usize,
        report: &mut ReconciliationReport,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let queue = ReconciliationCheck::fix_queue(requests, missing);
        for (batch, records) in queue.chunks(batch_size.max(1)).enumerate() {
            info!(batch, size = records.len(), "Auto-fixing missing ledger entries");
            for record in records {
                let request = match ReconciliationCheck::fix_request(record) {
                    Ok(request) => request,
                    Err(err) => {
                        error!(request_id = %record.id, error = %err, "Cannot re-derive usage");
                        report.fix_failures += 1;
                        continue;
                    }
                };
                match self.wallets.post(record.user_id, record.year(), request, now).await {
                    Ok(PostingOutcome::Posted(_)) => report.fixed += 1,
                    Ok(_) => info!(request_id = %record.id, "Usage already present, nothing to fix"),
                    Err(err) if aborts_batch(&err) => return Err(err),
                    Err(err) => {
                        error!(request_id = %record.id, error = %err, "Auto-fix failed");
                        report.fix_failures += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks 3 and 4 on every wallet; repairs drifted columns when enabled.
    async fn check_wallets(
        &self,
        options: ReconciliationOptions,
        report: &mut ReconciliationReport,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        for (user_id, year) in self.wallets.wallet_keys(options.year).await? {
            let book = match self.wallets.load_book(user_id, year).await {
                Ok(book) => book,
                Err(err) if aborts_batch(&err) => return Err(err),
                Err(err) => {
                    error!(user_id = %user_id, year, error = %err, "Cannot load wallet");
                    continue;
                }
            };
            report.wallets_checked += 1;

            if let Some(drift) = ReconciliationCheck::wallet_drift(&book, now) {
                warn!(user_id = %user_id, year, details = %drift.details, "Wallet columns drifted from ledger");
                report.extend([drift]);
                if options.auto_fix {
                    self.fix_drift(user_id, year, report, now).await?;
                }
            }

            let remaining = ReconciliationCheck::bucket_remaining_drift(&book, now);
            if !remaining.is_empty() {
                warn!(user_id = %user_id, year, buckets = remaining.len(), "Bucket remaining amounts drifted");
            }
            report.extend(remaining);
        }
        Ok(())
    }

    async fn fix_drift(
        &self,
        user_id: UserId,
        year: i32,
        report: &mut ReconciliationReport,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        match self
            .wallets
            .with_book(user_id, year, now, |book| Ok(book.resync_counters()))
            .await
        {
            Ok(buckets) => {
                info!(user_id = %user_id, year, buckets = ?buckets, "Wallet columns rewritten from ledger");
                report.fixed += 1;
                Ok(())
            }
            Err(err) if aborts_batch(&err) => Err(err),
            Err(err) => {
                error!(user_id = %user_id, year, error = %err, "Drift fix failed");
                report.fix_failures += 1;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = LedgerConfig {
            reconciliation_auto_fix: true,
            reconciliation_batch_size: 25,
            ..LedgerConfig::default()
        };
        let options = ReconciliationOptions::from_config(&config);
        assert!(options.auto_fix);
        assert_eq!(options.batch_size, 25);
        assert_eq!(options.year, None);
    }

    #[test]
    fn test_default_options_report_only() {
        let options = ReconciliationOptions::default();
        assert!(!options.auto_fix);
        assert_eq!(options.batch_size, 100);
    }
}
