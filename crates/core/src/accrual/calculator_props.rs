//! Property-based tests for AccrualCalculator.
//!
//! - Targets never decrease as the month advances
//! - A second run for the same month plans nothing
//! - Running every month in sequence lands on the same balances as one run

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use saldo_shared::types::{ContractId, UserId};

use super::calculator::AccrualCalculator;
use super::contract::EmployeeContract;
use crate::balance::LeaveBalanceType;
use crate::ledger::LeaveBook;

/// Strategy for a contract starting somewhere in the year, 8 to 40 weekly hours.
fn arb_contract() -> impl Strategy<Value = EmployeeContract> {
    (0u32..300u32, 8i64..=40i64, prop::sample::select(vec!["FULL_TIME", "PART_TIME", "APPRENTICE"]))
        .prop_map(|(offset, hours, contract_type)| EmployeeContract {
            id: ContractId::new(),
            user_id: UserId::new(),
            contract_type: contract_type.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
                + chrono::Duration::days(i64::from(offset)),
            end_date: None,
            weekly_hours: Decimal::from(hours),
            agreement_id: None,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Target for month m+1 is at least the target for month m.
    #[test]
    fn prop_target_monotone(contract in arb_contract(), month in 1u32..12u32) {
        let contracts = vec![contract];
        let earlier = AccrualCalculator::target(&contracts, &[], 2025, month);
        let later = AccrualCalculator::target(&contracts, &[], 2025, month + 1);
        if let (Ok(earlier), Ok(later)) = (earlier, later) {
            for bucket in AccrualCalculator::BUCKETS {
                prop_assert!(later.total(bucket) >= earlier.total(bucket));
            }
        }
    }

    /// Applying a plan and planning again yields no deltas.
    #[test]
    fn prop_recalculation_idempotent(contract in arb_contract(), month in 1u32..=12u32) {
        let contracts = vec![contract];
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let Ok(target) = AccrualCalculator::target(&contracts, &[], 2025, month) else {
            return Ok(());
        };
        let mut book = LeaveBook::open(UserId::new(), 2025);
        let plan = AccrualCalculator::plan(&book, target.clone());
        AccrualCalculator::apply(&mut book, &plan, now).unwrap();

        let again = AccrualCalculator::plan(&book, target);
        prop_assert!(again.is_empty());
    }

    /// Monthly runs converge on the single year-end run.
    #[test]
    fn prop_monthly_runs_converge(contract in arb_contract()) {
        let contracts = vec![contract];
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let Ok(year_end) = AccrualCalculator::target(&contracts, &[], 2025, 12) else {
            return Ok(());
        };

        let mut book = LeaveBook::open(UserId::new(), 2025);
        for month in 1..=12 {
            if let Ok(target) = AccrualCalculator::target(&contracts, &[], 2025, month) {
                let plan = AccrualCalculator::plan(&book, target);
                AccrualCalculator::apply(&mut book, &plan, now).unwrap();
            }
        }

        for bucket in AccrualCalculator::BUCKETS {
            prop_assert_eq!(book.wallet().balance(bucket), year_end.total(bucket));
        }
        prop_assert_eq!(
            book.wallet().balance(LeaveBalanceType::VacationAc),
            AccrualCalculator::accrued_by_runs(&book, LeaveBalanceType::VacationAc)
        );
    }
}
