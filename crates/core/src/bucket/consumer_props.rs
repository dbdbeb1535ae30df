//! Property-based tests for BucketConsumer.
//!
//! - Conservation: consumed + shortfall equals the request
//! - Remaining amounts only decrease and never go negative
//! - FIFO: a later-expiring entry is touched only once earlier ones are empty
//! - Input order does not matter, only expiry and creation time

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use saldo_shared::types::LedgerEntryId;

use super::consumer::{BucketConsumer, BucketEntry};

/// Earliest generated expiry, so no generated entry is expired.
fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

/// Strategy for remaining amounts (0.0 to 50.0, one decimal place).
fn arb_remaining() -> impl Strategy<Value = Decimal> {
    (0i64..500i64).prop_map(|tenths| Decimal::new(tenths, 1))
}

/// Strategy for an optional expiry within a few years.
fn arb_expiry() -> impl Strategy<Value = Option<NaiveDate>> {
    prop::option::of((0i64..1500i64).prop_map(|days| {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(days)
    }))
}

fn arb_entries() -> impl Strategy<Value = Vec<BucketEntry>> {
    prop::collection::vec((arb_remaining(), arb_expiry()), 0..8).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (remaining, expiry_date))| BucketEntry {
                id: LedgerEntryId::new(),
                remaining,
                expiry_date,
                created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
                    + Duration::minutes(i64::try_from(i).unwrap()),
            })
            .collect()
    })
}

fn arb_request() -> impl Strategy<Value = Decimal> {
    (0i64..3000i64).prop_map(|tenths| Decimal::new(tenths, 1))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// consumed + shortfall == requested, and consumed == sum of draws.
    #[test]
    fn prop_consumption_conserves_amount(mut entries in arb_entries(), amount in arb_request()) {
        let result = BucketConsumer::consume(&mut entries, amount, today());
        let drawn: Decimal = result.draws.iter().map(|d| d.amount).sum();

        prop_assert_eq!(result.consumed + result.shortfall, amount);
        prop_assert_eq!(drawn, result.consumed);
    }

    /// Remaining amounts never increase and never go negative.
    #[test]
    fn prop_remaining_monotone_and_non_negative(entries in arb_entries(), amount in arb_request()) {
        let mut after = entries.clone();
        let _ = BucketConsumer::consume(&mut after, amount, today());

        for (before, after) in entries.iter().zip(&after) {
            prop_assert!(after.remaining >= Decimal::ZERO);
            prop_assert!(after.remaining <= before.remaining);
        }
    }

    /// Shortfall only when every entry has been emptied.
    #[test]
    fn prop_shortfall_only_when_exhausted(mut entries in arb_entries(), amount in arb_request()) {
        let result = BucketConsumer::consume(&mut entries, amount, today());
        if !result.is_complete() {
            prop_assert!(entries.iter().all(|e| e.remaining.is_zero()));
        }
    }

    /// A drawn entry implies every entry earlier in FIFO order was emptied.
    #[test]
    fn prop_fifo_order_respected(mut entries in arb_entries(), amount in arb_request()) {
        let before = entries.clone();
        let _ = BucketConsumer::consume(&mut entries, amount, today());

        for (i, touched) in entries.iter().enumerate() {
            if touched.remaining >= before[i].remaining {
                continue;
            }
            for other in &entries {
                if BucketConsumer::fifo_order(other, touched).is_lt() {
                    prop_assert!(other.remaining.is_zero());
                }
            }
        }
    }

    /// Shuffling the input does not change which entries are consumed.
    #[test]
    fn prop_input_order_irrelevant(entries in arb_entries(), amount in arb_request()) {
        let mut forward = entries.clone();
        let mut reversed: Vec<_> = entries.iter().rev().cloned().collect();

        let _ = BucketConsumer::consume(&mut forward, amount, today());
        let _ = BucketConsumer::consume(&mut reversed, amount, today());

        for entry in &forward {
            let twin = reversed.iter().find(|e| e.id == entry.id).unwrap();
            prop_assert_eq!(twin.remaining, entry.remaining);
        }
    }
}
