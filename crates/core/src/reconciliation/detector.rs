//! The reconciliation checks and auto-fix planning.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::{LedgerEntryId, PostingId, WalletId};
use serde::Serialize;
use serde_json::json;

use super::anomaly::{Anomaly, AnomalyType, EntityType};
use super::source::LeaveRequestRecord;
use crate::balance::{LeaveBalanceType, quantize};
use crate::ledger::{
    APPROVED_STATUS, LeaveBook, LeaveCounters, LeaveEntry, LedgerEntryType, Reference,
    ReferenceType, TransactionRequest, TransactionType, WalletError,
};

/// Description written on repaired usages.
pub const AUTO_FIX_DESCRIPTION: &str = "Auto-fixed by reconciliation";

/// A usage posting that has not been reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRef {
    /// Leave request id.
    pub reference_id: String,
    /// Posting.
    pub posting_id: PostingId,
    /// First line of the posting.
    pub entry_id: LedgerEntryId,
    /// Wallet.
    pub wallet_id: WalletId,
    /// Wallet year.
    pub year: i32,
    /// Deducted amount, positive.
    pub amount: Decimal,
}

/// Reconciliation checks. All functions are pure.
pub struct ReconciliationCheck;

impl ReconciliationCheck {
    /// Active usage postings referencing leave requests.
    ///
    /// A reference whose usages are all matched by reversals is not active.
    #[must_use]
    pub fn active_usages(entries: &[LeaveEntry]) -> Vec<UsageRef> {
        let mut usages: BTreeMap<&str, Vec<PostingId>> = BTreeMap::new();
        let mut reversals: HashMap<&str, HashSet<PostingId>> = HashMap::new();
        for entry in entries {
            let Some(reference) = &entry.reference else {
                continue;
            };
            if reference.reference_type != ReferenceType::LeaveRequest {
                continue;
            }
            let id = reference.reference_id.as_str();
            match entry.entry_type {
                LedgerEntryType::Usage => {
                    let postings = usages.entry(id).or_default();
                    if !postings.contains(&entry.posting_id) {
                        postings.push(entry.posting_id);
                    }
                }
                LedgerEntryType::Reversal => {
                    reversals.entry(id).or_default().insert(entry.posting_id);
                }
                _ => {}
            }
        }

        usages
            .into_iter()
            .filter(|(id, postings)| postings.len() > reversals.get(id).map_or(0, HashSet::len))
            .filter_map(|(id, postings)| {
                let posting_id = *postings.last()?;
                let lines: Vec<&LeaveEntry> =
                    entries.iter().filter(|e| e.posting_id == posting_id).collect();
                let first = lines.first()?;
                Some(UsageRef {
                    reference_id: id.to_string(),
                    posting_id,
                    entry_id: first.id,
                    wallet_id: first.wallet_id,
                    year: first.year,
                    amount: -lines.iter().map(|e| e.amount).sum::<Decimal>(),
                })
            })
            .collect()
    }

    /// Check 1: approved requests marked deducted with no active usage.
    #[must_use]
    pub fn missing_ledger_entries(
        requests: &[LeaveRequestRecord],
        usage_references: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Vec<Anomaly> {
        requests
            .iter()
            .filter(|r| r.is_approved() && r.balance_deducted)
            .filter(|r| !usage_references.contains(&r.id))
            .map(|r| {
                Anomaly::new(
                    AnomalyType::MissingLedgerEntry,
                    EntityType::LeaveRequest,
                    r.id.clone(),
                    json!({
                        "user_id": r.user_id,
                        "leave_type": r.leave_type,
                        "year": r.year(),
                        "days_requested": r.days_requested,
                        "hours_requested": r.hours_requested,
                    }),
                    now,
                )
            })
            .collect()
    }

    /// Check 2: usages whose request is not approved, or unknown to the workflow.
    #[must_use]
    pub fn orphan_ledger_entries(
        usages: &[UsageRef],
        statuses: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Vec<Anomaly> {
        usages
            .iter()
            .filter_map(|usage| {
                let status = statuses.get(&usage.reference_id);
                if status.is_some_and(|s| s.eq_ignore_ascii_case(APPROVED_STATUS)) {
                    return None;
                }
                Some(Anomaly::new(
                    AnomalyType::OrphanLedgerEntry,
                    EntityType::LedgerEntry,
                    usage.entry_id.to_string(),
                    json!({
                        "reference_id": usage.reference_id,
                        "posting_id": usage.posting_id,
                        "wallet_id": usage.wallet_id,
                        "year": usage.year,
                        "amount": usage.amount,
                        "request_status": status,
                    }),
                    now,
                ))
            })
            .collect()
    }

    /// Check 3: stored wallet columns against the ledger replay.
    #[must_use]
    pub fn wallet_drift(book: &LeaveBook, now: DateTime<Utc>) -> Option<Anomaly> {
        let stored = LeaveCounters::from_wallet(book.wallet());
        let mut replayed_book = book.clone();
        if replayed_book.resync_counters().is_empty() {
            return None;
        }
        let replayed = LeaveCounters::from_wallet(replayed_book.wallet());
        let columns: serde_json::Map<String, serde_json::Value> = stored
            .ledger_mismatches(&replayed)
            .into_iter()
            .map(|(column, wallet, ledger)| {
                (column.to_string(), json!({"wallet": wallet, "ledger": ledger}))
            })
            .collect();
        if columns.is_empty() {
            return None;
        }
        let wallet = book.wallet();
        Some(Anomaly::new(
            AnomalyType::WalletLedgerDrift,
            EntityType::Wallet,
            wallet.id.to_string(),
            json!({
                "user_id": wallet.user_id,
                "year": wallet.year,
                "columns": columns,
            }),
            now,
        ))
    }

    /// Check 4: per bucket, sum of remaining amounts against the ledger balance.
    #[must_use]
    pub fn bucket_remaining_drift(book: &LeaveBook, now: DateTime<Utc>) -> Vec<Anomaly> {
        let replayed = book.replayed_sheet();
        let wallet = book.wallet();
        book.remaining_by_bucket()
            .into_iter()
            .filter_map(|(bucket, remaining)| {
                let balance = replayed.balance(bucket);
                if remaining == balance {
                    return None;
                }
                Some(Anomaly::new(
                    AnomalyType::BucketRemainingDrift,
                    EntityType::Wallet,
                    wallet.id.to_string(),
                    json!({
                        "user_id": wallet.user_id,
                        "year": wallet.year,
                        "balance_type": bucket,
                        "remaining": remaining,
                        "balance": balance,
                    }),
                    now,
                ))
            })
            .collect()
    }

    /// Repairable requests among the findings, oldest first.
    #[must_use]
    pub fn fix_queue<'a>(
        requests: &'a [LeaveRequestRecord],
        missing: &[Anomaly],
    ) -> Vec<&'a LeaveRequestRecord> {
        let ids: HashSet<&str> = missing
            .iter()
            .filter(|a| a.anomaly_type == AnomalyType::MissingLedgerEntry)
            .map(|a| a.entity_id.as_str())
            .collect();
        let mut queue: Vec<&LeaveRequestRecord> = requests
            .iter()
            .filter(|r| ids.contains(r.id.as_str()))
            .collect();
        queue.sort_by(|a, b| {
            a.ordering_time()
                .cmp(&b.ordering_time())
                .then_with(|| a.id.cmp(&b.id))
        });
        queue
    }

    /// The usage re-derived from an approved request.
    ///
    /// The deduction is tolerant: the usage happened in the workflow, the
    /// ledger only records it.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBalanceType` for unmapped leave types and
    /// `NonPositiveAmount` for empty requests.
    pub fn fix_request(
        record: &LeaveRequestRecord,
    ) -> Result<TransactionRequest<LeaveBalanceType>, WalletError> {
        let balance_type = record
            .balance_type()
            .ok_or_else(|| WalletError::UnknownBalanceType(record.leave_type.clone()))?;
        let amount = quantize(balance_type, record.amount());
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount(amount));
        }
        let reference = Reference::leave_request(record.id.clone())?.with_status(APPROVED_STATUS);
        Ok(
            TransactionRequest::new(TransactionType::Deduction, balance_type, amount)
                .with_reference(reference)
                .with_description(AUTO_FIX_DESCRIPTION)
                .tolerant(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LeaveWallet, PostingOutcome};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use saldo_shared::types::UserId;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 2, 3, 0, 0).unwrap()
    }

    fn request(id: &str, leave_type: &str, days: Decimal, approved_day: u32) -> LeaveRequestRecord {
        LeaveRequestRecord {
            id: id.into(),
            user_id: UserId::new(),
            leave_type: leave_type.into(),
            status: "APPROVED".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 4, 14).unwrap(),
            days_requested: days,
            hours_requested: None,
            balance_deducted: true,
            approved_at: Some(Utc.with_ymd_and_hms(2025, 4, approved_day, 9, 0, 0).unwrap()),
            created_at: Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap(),
        }
    }

    fn funded_book() -> LeaveBook {
        let mut book = LeaveBook::open(UserId::new(), 2025);
        for (kind, amount) in [
            (LeaveBalanceType::VacationAc, dec!(10)),
            (LeaveBalanceType::Rol, dec!(20)),
        ] {
            book.post(TransactionRequest::new(TransactionType::Accrual, kind, amount), now())
                .unwrap();
        }
        book
    }

    fn deduct(book: &mut LeaveBook, reference: &str, amount: Decimal) {
        book.post(
            TransactionRequest::new(TransactionType::Deduction, LeaveBalanceType::Vacation, amount)
                .with_reference(Reference::leave_request(reference).unwrap()),
            now(),
        )
        .unwrap();
    }

    #[test]
    fn test_missing_ledger_entry_detected_once() {
        let mut book = funded_book();
        deduct(&mut book, "lr-booked", dec!(1));
        let usages = ReconciliationCheck::active_usages(book.entries());
        let refs: HashSet<String> = usages.iter().map(|u| u.reference_id.clone()).collect();

        let mut not_deducted = request("lr-pending", "FERIE", dec!(1), 3);
        not_deducted.balance_deducted = false;
        let requests = vec![
            request("lr-booked", "FERIE", dec!(1), 1),
            request("lr-missing", "FERIE", dec!(2), 2),
            not_deducted,
        ];

        let anomalies = ReconciliationCheck::missing_ledger_entries(&requests, &refs, now());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].entity_id, "lr-missing");
        assert_eq!(anomalies[0].severity, crate::reconciliation::Severity::High);
    }

    #[test]
    fn test_reversed_usage_is_not_active() {
        let mut book = funded_book();
        deduct(&mut book, "lr-1", dec!(2));
        deduct(&mut book, "lr-2", dec!(1));
        book.post(
            TransactionRequest::new(TransactionType::Refund, LeaveBalanceType::Vacation, dec!(2))
                .with_reference(Reference::leave_request("lr-1").unwrap()),
            now(),
        )
        .unwrap();

        let usages = ReconciliationCheck::active_usages(book.entries());
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].reference_id, "lr-2");
        assert_eq!(usages[0].amount, dec!(1));
    }

    #[test]
    fn test_orphan_ledger_entries() {
        let mut book = funded_book();
        deduct(&mut book, "lr-approved", dec!(1));
        deduct(&mut book, "lr-cancelled", dec!(1));
        deduct(&mut book, "lr-unknown", dec!(1));
        let usages = ReconciliationCheck::active_usages(book.entries());

        let statuses = HashMap::from([
            ("lr-approved".to_string(), "APPROVED".to_string()),
            ("lr-cancelled".to_string(), "CANCELLED".to_string()),
        ]);
        let anomalies = ReconciliationCheck::orphan_ledger_entries(&usages, &statuses, now());
        let mut refs: Vec<&str> = anomalies
            .iter()
            .map(|a| a.details["reference_id"].as_str().unwrap())
            .collect();
        refs.sort_unstable();
        assert_eq!(refs, vec!["lr-cancelled", "lr-unknown"]);
        assert!(anomalies.iter().all(|a| a.anomaly_type == AnomalyType::OrphanLedgerEntry));
    }

    #[test]
    fn test_wallet_drift_detected_and_clean_wallet_passes() {
        let mut book = funded_book();
        deduct(&mut book, "lr-1", dec!(3));
        assert!(ReconciliationCheck::wallet_drift(&book, now()).is_none());

        // wallet row edited behind the ledger's back
        let mut counters = LeaveCounters::from_wallet(book.wallet());
        counters.vacation_used_ac = dec!(1);
        let wallet: LeaveWallet =
            counters.into_wallet(book.wallet().id, book.wallet().user_id, book.wallet().year);
        let drifted = LeaveBook::new(wallet, book.entries().to_vec(), Vec::new());

        let anomaly = ReconciliationCheck::wallet_drift(&drifted, now()).unwrap();
        assert_eq!(anomaly.anomaly_type, AnomalyType::WalletLedgerDrift);
        assert_eq!(anomaly.details["columns"]["vacation_used_ac"]["wallet"], "1");
        assert_eq!(anomaly.details["columns"]["vacation_used_ac"]["ledger"], "3");
    }

    #[test]
    fn test_bucket_remaining_drift_after_tolerated_shortfall() {
        let mut book = funded_book();
        assert!(ReconciliationCheck::bucket_remaining_drift(&book, now()).is_empty());

        let outcome = book
            .post(
                TransactionRequest::new(TransactionType::Deduction, LeaveBalanceType::Rol, dec!(25))
                    .tolerant(),
                now(),
            )
            .unwrap();
        assert!(matches!(outcome, PostingOutcome::Posted(_)));
        assert!(!outcome.warnings().is_empty());

        let anomalies = ReconciliationCheck::bucket_remaining_drift(&book, now());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].details["balance_type"], "rol");
        assert_eq!(anomalies[0].details["balance"], "-5");
    }

    #[test]
    fn test_fix_queue_is_oldest_first() {
        let requests = vec![
            request("lr-c", "FERIE", dec!(1), 9),
            request("lr-a", "FERIE", dec!(1), 2),
            request("lr-b", "ROL", dec!(1), 5),
        ];
        let refs = HashSet::new();
        let missing = ReconciliationCheck::missing_ledger_entries(&requests, &refs, now());
        let queue = ReconciliationCheck::fix_queue(&requests, &missing);
        let ids: Vec<&str> = queue.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["lr-a", "lr-b", "lr-c"]);
    }

    #[test]
    fn test_auto_fix_creates_one_tagged_usage() {
        let mut book = funded_book();
        let record = request("lr-missing", "FERIE", dec!(2), 2);
        let fix = ReconciliationCheck::fix_request(&record).unwrap();
        let outcome = book.post(fix.clone(), now()).unwrap();
        assert!(outcome.is_posted());

        let usages: Vec<&LeaveEntry> = book
            .entries()
            .iter()
            .filter(|e| e.entry_type == LedgerEntryType::Usage)
            .collect();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].amount, dec!(-2));
        assert!(usages[0].description.as_deref().unwrap().starts_with("Auto-fixed"));
        assert_eq!(
            usages[0].reference.as_ref().unwrap().status.as_deref(),
            Some(APPROVED_STATUS)
        );

        // second run finds the usage and does nothing
        let again = book.post(fix, now()).unwrap();
        assert!(matches!(again, PostingOutcome::Duplicate(_)));
        let refs: HashSet<String> = ReconciliationCheck::active_usages(book.entries())
            .into_iter()
            .map(|u| u.reference_id)
            .collect();
        assert!(ReconciliationCheck::missing_ledger_entries(&[record], &refs, now()).is_empty());
    }

    #[test]
    fn test_fix_request_rejects_unmapped_and_empty() {
        let unknown = request("lr-1", "MALATTIA", dec!(1), 1);
        assert_eq!(
            ReconciliationCheck::fix_request(&unknown).unwrap_err().error_code(),
            "UNKNOWN_BALANCE_TYPE"
        );
        let empty = request("lr-2", "FERIE", dec!(0), 1);
        assert_eq!(
            ReconciliationCheck::fix_request(&empty).unwrap_err().error_code(),
            "NON_POSITIVE_AMOUNT"
        );
    }
}
