//! Property-based tests for WalletBook.
//!
//! - Ledger sum equals the published aggregate for every balance type
//! - Replaying the ledger reproduces the counters
//! - Remaining amounts never go negative, and match balances when no
//!   shortfall was tolerated
//! - reserve + confirm is equivalent to a direct usage
//! - confirm is idempotent

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use saldo_shared::types::UserId;

use super::book::WalletBook;
use super::entry::{LedgerEntryType, Reference};
use super::leave::LeaveCounters;
use super::posting::{TransactionRequest, TransactionType};
use super::sheet::BalanceSheet;
use crate::balance::{BalanceKind, LeaveBalanceType};
use crate::reservation::ReserveRequest;

#[derive(Debug, Clone)]
enum Op {
    Post(TransactionType, LeaveBalanceType, Decimal),
    TolerantDeduction(LeaveBalanceType, Decimal),
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()
}

/// Strategy for amounts 0.1 to 20.0 (one decimal place, valid for every type).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=200i64).prop_map(|tenths| Decimal::new(tenths, 1))
}

fn arb_kind() -> impl Strategy<Value = LeaveBalanceType> {
    prop::sample::select(LeaveBalanceType::ALL.to_vec())
}

fn arb_transaction_type() -> impl Strategy<Value = TransactionType> {
    prop_oneof![
        Just(TransactionType::Accrual),
        Just(TransactionType::Deduction),
        Just(TransactionType::Refund),
        Just(TransactionType::Adjustment),
        Just(TransactionType::CarryOver),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (arb_transaction_type(), arb_kind(), arb_amount(), any::<bool>()).prop_map(
            |(transaction_type, kind, amount, negate)| {
                let amount = if transaction_type == TransactionType::Adjustment && negate {
                    -amount
                } else {
                    amount
                };
                Op::Post(transaction_type, kind, amount)
            }
        ),
        1 => (arb_kind(), arb_amount()).prop_map(|(kind, amount)| Op::TolerantDeduction(kind, amount)),
    ]
}

/// Histories that never overdraw: accruals, carry-overs, positive
/// adjustments and enforced deductions.
fn arb_safe_op() -> impl Strategy<Value = Op> {
    (
        prop_oneof![
            Just(TransactionType::Accrual),
            Just(TransactionType::Deduction),
            Just(TransactionType::Adjustment),
            Just(TransactionType::CarryOver),
        ],
        arb_kind(),
        arb_amount(),
    )
        .prop_map(|(transaction_type, kind, amount)| Op::Post(transaction_type, kind, amount))
}

fn run(ops: &[Op]) -> WalletBook<LeaveBalanceType> {
    let mut book = WalletBook::open(UserId::new(), 2025);
    for op in ops {
        let request = match op {
            Op::Post(transaction_type, kind, amount) => {
                TransactionRequest::new(*transaction_type, *kind, *amount)
            }
            Op::TolerantDeduction(kind, amount) => {
                TransactionRequest::new(TransactionType::Deduction, *kind, *amount).tolerant()
            }
        };
        // refused requests leave the book untouched
        let _ = book.post(request, now());
    }
    book
}

fn ledger_sum(book: &WalletBook<LeaveBalanceType>, kind: LeaveBalanceType) -> Decimal {
    book.entries()
        .iter()
        .filter(|e| kind.buckets().contains(&e.balance_type))
        .map(|e| e.amount)
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(150))]

    /// sum(ledger.amount) equals the published balance for every type.
    #[test]
    fn prop_ledger_sum_matches_aggregate(ops in prop::collection::vec(arb_op(), 0..40)) {
        let book = run(&ops);
        for kind in LeaveBalanceType::ALL {
            prop_assert_eq!(ledger_sum(&book, *kind), book.wallet().balance(*kind));
        }
    }

    /// Replaying the ledger reproduces every counter.
    #[test]
    fn prop_replay_reproduces_counters(ops in prop::collection::vec(arb_op(), 0..40)) {
        let book = run(&ops);
        let replayed = BalanceSheet::replay(book.entries());
        prop_assert!(book.wallet().sheet.differing_buckets(&replayed).is_empty());
    }

    /// Every line lives on a concrete bucket and remaining is never negative.
    #[test]
    fn prop_lines_well_formed(ops in prop::collection::vec(arb_op(), 0..40)) {
        let book = run(&ops);
        for entry in book.entries() {
            prop_assert!(entry.balance_type.is_concrete());
            prop_assert!(entry.remaining_amount >= Decimal::ZERO);
            prop_assert!(entry.remaining_amount <= entry.amount.max(Decimal::ZERO));
            prop_assert_ne!(entry.entry_type, LedgerEntryType::Reservation);
        }
    }

    /// Without tolerated overdraws, remaining amounts add up to balances.
    #[test]
    fn prop_remaining_matches_balance(ops in prop::collection::vec(arb_safe_op(), 0..40)) {
        let book = run(&ops);
        let remaining = book.remaining_by_bucket();
        for bucket in LeaveBalanceType::concrete() {
            prop_assert_eq!(remaining[&bucket], book.wallet().balance(bucket));
        }
    }

    /// The named-column projection preserves every balance.
    #[test]
    fn prop_projection_preserves_balances(ops in prop::collection::vec(arb_op(), 0..30)) {
        let book = run(&ops);
        let wallet = book.wallet();
        let rebuilt = LeaveCounters::from_wallet(wallet).into_wallet(wallet.id, wallet.user_id, wallet.year);
        for kind in LeaveBalanceType::ALL {
            prop_assert_eq!(rebuilt.balance(*kind), wallet.balance(*kind));
        }
    }

    /// reserve + confirm ends in the same state as a direct usage.
    #[test]
    fn prop_reserve_confirm_equals_direct_usage(
        setup in prop::collection::vec(arb_safe_op(), 0..20),
        kind in arb_kind(),
        amount in arb_amount(),
    ) {
        let mut via_reservation = run(&setup);
        let mut direct = via_reservation.clone();
        let reference = Reference::leave_request("lr-prop").unwrap();

        let reserved = via_reservation.reserve(
            ReserveRequest {
                reference_id: "lr-prop".into(),
                balance_type: kind,
                amount,
                expires_at: now() + Duration::hours(1),
            },
            now(),
        );
        let posted = direct.post(
            TransactionRequest::new(TransactionType::Deduction, kind, amount).with_reference(reference),
            now(),
        );

        prop_assert_eq!(reserved.is_ok(), posted.is_ok());
        if reserved.is_ok() {
            via_reservation.confirm("lr-prop", None, now()).unwrap();
            prop_assert_eq!(&via_reservation.wallet().sheet, &direct.wallet().sheet);
            prop_assert_eq!(via_reservation.remaining_by_bucket(), direct.remaining_by_bucket());
        }
    }

    /// Confirming twice yields one usage posting and one deduction.
    #[test]
    fn prop_confirm_idempotent(
        setup in prop::collection::vec(arb_safe_op(), 1..20),
        amount in arb_amount(),
    ) {
        let mut book = run(&setup);
        let available = book.available(LeaveBalanceType::Vacation, now());
        prop_assume!(available >= amount);

        book.reserve(
            ReserveRequest {
                reference_id: "lr-twice".into(),
                balance_type: LeaveBalanceType::Vacation,
                amount,
                expires_at: now() + Duration::hours(1),
            },
            now(),
        )
        .unwrap();
        book.confirm("lr-twice", None, now()).unwrap();
        let after_first = book.wallet().clone();
        book.confirm("lr-twice", None, now()).unwrap();

        let reference = Reference::leave_request("lr-twice").unwrap();
        prop_assert_eq!(book.postings_for(LedgerEntryType::Usage, &reference).len(), 1);
        prop_assert_eq!(book.wallet(), &after_first);
        prop_assert_eq!(book.wallet().balance(LeaveBalanceType::Vacation), available - amount);
    }
}
