//! Integration tests for the accrual, reconciliation and rollover jobs.
//!
//! Collaborating services are replaced by in-memory fakes. Each test uses
//! its own users and, where a job scans a whole year, its own year.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use saldo_core::accrual::{AgreementVersion, ContractDirectory, DirectoryError, EmployeeContract};
use saldo_core::balance::LeaveBalanceType::{Permits, Rol, Vacation, VacationAc, VacationAp};
use saldo_core::ledger::{LedgerEntryType, WalletStatus};
use saldo_core::reconciliation::{
    AUTO_FIX_DESCRIPTION, AnomalyType, LeaveRequestRecord, LeaveRequestSource, Severity,
    SourceError,
};
use saldo_db::{ReconciliationJob, ReconciliationOptions, RolloverJob, WalletRepository};
use saldo_db::jobs::AccrualJob;
use saldo_shared::types::{AgreementId, ContractId, UserId};

use common::{accrual, connect, deduction, now, reference};

// ========== Fakes ==========

struct FakeDirectory {
    contracts: Vec<EmployeeContract>,
    versions: Vec<AgreementVersion>,
}

#[async_trait]
impl ContractDirectory for FakeDirectory {
    async fn employees(&self, _year: i32) -> Result<Vec<UserId>, DirectoryError> {
        let mut users: Vec<UserId> = self.contracts.iter().map(|c| c.user_id).collect();
        users.dedup();
        Ok(users)
    }

    async fn contracts(&self, user_id: UserId, _year: i32) -> Result<Vec<EmployeeContract>, DirectoryError> {
        Ok(self.contracts.iter().filter(|c| c.user_id == user_id).cloned().collect())
    }

    async fn agreement_versions(&self, agreement_id: AgreementId) -> Result<Vec<AgreementVersion>, DirectoryError> {
        Ok(self
            .versions
            .iter()
            .filter(|v| v.agreement_id == agreement_id)
            .cloned()
            .collect())
    }
}

struct FakeWorkflow {
    requests: Vec<LeaveRequestRecord>,
    statuses: HashMap<String, String>,
}

#[async_trait]
impl LeaveRequestSource for FakeWorkflow {
    async fn approved_with_deduction(&self) -> Result<Vec<LeaveRequestRecord>, SourceError> {
        Ok(self.requests.clone())
    }

    async fn statuses(&self, ids: &[String]) -> Result<HashMap<String, String>, SourceError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.statuses.get(id).map(|s| (id.clone(), s.clone())))
            .collect())
    }
}

struct DownWorkflow;

#[async_trait]
impl LeaveRequestSource for DownWorkflow {
    async fn approved_with_deduction(&self) -> Result<Vec<LeaveRequestRecord>, SourceError> {
        Err(SourceError::Timeout)
    }

    async fn statuses(&self, _ids: &[String]) -> Result<HashMap<String, String>, SourceError> {
        Err(SourceError::Timeout)
    }
}

fn contract(user_id: UserId, contract_type: &str, weekly_hours: Decimal) -> EmployeeContract {
    EmployeeContract {
        id: ContractId::new(),
        user_id,
        contract_type: contract_type.to_string(),
        start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        end_date: None,
        weekly_hours,
        agreement_id: None,
    }
}

fn approved_request(user_id: UserId, id: &str, leave_type: &str, days: Decimal) -> LeaveRequestRecord {
    LeaveRequestRecord {
        id: id.to_string(),
        user_id,
        leave_type: leave_type.to_string(),
        status: "APPROVED".to_string(),
        start_date: NaiveDate::from_ymd_opt(2025, 4, 14).unwrap(),
        days_requested: days,
        hours_requested: None,
        balance_deducted: true,
        approved_at: Some(Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()),
        created_at: Utc.with_ymd_and_hms(2025, 3, 28, 8, 0, 0).unwrap(),
    }
}

// ========== Accrual ==========

#[tokio::test]
async fn test_accrual_full_year_then_rerun_is_noop() {
    let Some(db) = connect().await else { return };
    let user = UserId::new();
    let directory = Arc::new(FakeDirectory {
        contracts: vec![contract(user, "FULL_TIME", dec!(40))],
        versions: Vec::new(),
    });
    let job = AccrualJob::new(db.clone(), directory);

    let first = job.run(2025, 12, now()).await.unwrap();
    assert_eq!(first.accrued, 1);
    assert_eq!(first.postings, 3);

    let second = job.run(2025, 12, now()).await.unwrap();
    assert_eq!(second.accrued, 0);
    assert_eq!(second.unchanged, 1);

    let snapshot = WalletRepository::new(db).snapshot(user, 2025, now()).await.unwrap();
    assert_eq!(snapshot.counters.vacation_accrued, dec!(26));
    assert_eq!(snapshot.counters.vacation_current_year, dec!(26));
    assert_eq!(snapshot.counters.rol_accrued, dec!(72));
    assert_eq!(snapshot.counters.permits_total, dec!(32));
}

#[tokio::test]
async fn test_accrual_skips_unknown_contract_type() {
    let Some(db) = connect().await else { return };
    let user = UserId::new();
    let directory = Arc::new(FakeDirectory {
        contracts: vec![contract(user, "CONSULTANT", dec!(40))],
        versions: Vec::new(),
    });

    let summary = AccrualJob::new(db.clone(), directory).run(2025, 6, now()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    let book = WalletRepository::new(db).load_book(user, 2025).await.unwrap();
    assert!(book.entries().is_empty());
}

// ========== Reconciliation ==========

#[tokio::test]
async fn test_missing_entry_is_reported_then_fixed_once() {
    let Some(db) = connect().await else { return };
    let wallets = WalletRepository::new(db.clone());
    let user = UserId::new();
    let request_id = reference("lr");
    wallets.post(user, 2025, accrual(VacationAc, dec!(10)), now()).await.unwrap();

    let workflow = Arc::new(FakeWorkflow {
        requests: vec![approved_request(user, &request_id, "FERIE", dec!(2))],
        statuses: HashMap::from([(request_id.clone(), "APPROVED".to_string())]),
    });
    let job = ReconciliationJob::new(db.clone(), workflow);
    let options = ReconciliationOptions {
        year: Some(2025),
        ..ReconciliationOptions::default()
    };

    let report = job.run(options, now()).await.unwrap();
    let missing: Vec<_> = report
        .of_type(AnomalyType::MissingLedgerEntry)
        .filter(|a| a.entity_id == request_id)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].severity, Severity::High);
    assert_eq!(wallets.load_book(user, 2025).await.unwrap().entries().len(), 1);

    let fixing = ReconciliationOptions {
        auto_fix: true,
        ..options
    };
    job.run(fixing, now()).await.unwrap();
    let rerun = job.run(fixing, now()).await.unwrap();
    assert_eq!(
        rerun
            .of_type(AnomalyType::MissingLedgerEntry)
            .filter(|a| a.entity_id == request_id)
            .count(),
        0
    );

    let book = wallets.load_book(user, 2025).await.unwrap();
    let usages: Vec<_> = book
        .entries()
        .iter()
        .filter(|e| e.entry_type == LedgerEntryType::Usage)
        .collect();
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].amount, dec!(-2));
    assert_eq!(usages[0].description.as_deref(), Some(AUTO_FIX_DESCRIPTION));
    assert_eq!(book.wallet().balance(Vacation), dec!(8));
}

#[tokio::test]
async fn test_usage_of_cancelled_request_is_orphan() {
    let Some(db) = connect().await else { return };
    let wallets = WalletRepository::new(db.clone());
    let user = UserId::new();
    let request_id = reference("lr");
    wallets.post(user, 2025, accrual(Rol, dec!(16)), now()).await.unwrap();
    let outcome = wallets
        .post(user, 2025, deduction(Rol, dec!(8), &request_id), now())
        .await
        .unwrap();
    let line_id = outcome.posting().unwrap().lines[0].id.to_string();

    let workflow = Arc::new(FakeWorkflow {
        requests: Vec::new(),
        statuses: HashMap::from([(request_id.clone(), "CANCELLED".to_string())]),
    });
    let options = ReconciliationOptions {
        year: Some(2025),
        ..ReconciliationOptions::default()
    };
    let report = ReconciliationJob::new(db, workflow).run(options, now()).await.unwrap();

    let orphan = report
        .of_type(AnomalyType::OrphanLedgerEntry)
        .find(|a| a.entity_id == line_id)
        .unwrap();
    assert_eq!(orphan.severity, Severity::Medium);
    assert_eq!(orphan.details["request_status"], "CANCELLED");
}

#[tokio::test]
async fn test_unreachable_workflow_still_checks_wallets() {
    let Some(db) = connect().await else { return };
    let wallets = WalletRepository::new(db.clone());
    let user = UserId::new();
    wallets.post(user, 2025, accrual(Permits, dec!(8)), now()).await.unwrap();

    let options = ReconciliationOptions {
        year: Some(2025),
        ..ReconciliationOptions::default()
    };
    let report = ReconciliationJob::new(db, Arc::new(DownWorkflow))
        .run(options, now())
        .await
        .unwrap();

    assert_eq!(report.requests_checked, 0);
    assert!(report.wallets_checked >= 1);
}

// ========== Rollover ==========

#[tokio::test]
async fn test_rollover_carries_leftover_and_reruns_as_noop() {
    let Some(db) = connect().await else { return };
    let wallets = WalletRepository::new(db.clone());
    let user = UserId::new();
    // A year no other test writes to, since the job scans the whole year.
    let from_year = 2071;

    wallets.post(user, from_year, accrual(VacationAc, dec!(10)), now()).await.unwrap();
    wallets
        .post(user, from_year, deduction(Vacation, dec!(6), &reference("lr")), now())
        .await
        .unwrap();
    wallets.post(user, from_year, accrual(Rol, dec!(8)), now()).await.unwrap();

    let job = RolloverJob::new(db.clone(), None, 18);
    let first = job.run(from_year, now()).await.unwrap();
    assert!(first.rolled >= 1);
    assert_eq!(first.failed, 0);

    let target = wallets.snapshot(user, from_year + 1, now()).await.unwrap();
    assert_eq!(target.counters.vacation_previous_year, dec!(4));
    assert_eq!(target.counters.rol_previous_year, dec!(8));
    assert_eq!(target.counters.ap_expiry_date, NaiveDate::from_ymd_opt(2073, 6, 30));

    let source = wallets.snapshot(user, from_year, now()).await.unwrap();
    assert_eq!(source.counters.status, WalletStatus::Closed);

    let second = job.run(from_year, now()).await.unwrap();
    assert_eq!(second.rolled, 0);
    assert!(second.already_rolled >= 1);

    let book = wallets.load_book(user, from_year + 1).await.unwrap();
    let carried = book
        .entries()
        .iter()
        .filter(|e| e.entry_type == LedgerEntryType::CarryOver && e.balance_type == VacationAp)
        .count();
    assert_eq!(carried, 1);
}
