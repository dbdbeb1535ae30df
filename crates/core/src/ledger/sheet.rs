//! Per-bucket running counters of a wallet.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::entry::{LedgerEntry, LedgerEntryType};
use crate::balance::BalanceKind;

/// Running counters of one bucket.
///
/// The bucket balance `credited + carried - used` always equals the sum of
/// the bucket's ledger amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BucketCounters {
    /// Accruals and adjustments.
    pub credited: Decimal,
    /// Carry-overs from the previous year.
    pub carried: Decimal,
    /// Usages net of reversals.
    pub used: Decimal,
    /// Expiry inherited by new additive lines of the bucket.
    pub expiry_date: Option<NaiveDate>,
}

impl BucketCounters {
    /// Current balance.
    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.credited + self.carried - self.used
    }

    /// True when the bucket's deadline lies before `on`.
    #[must_use]
    pub fn is_expired(&self, on: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < on)
    }

    /// Balance that can still be drawn on `on`; an overdraft stays visible.
    #[must_use]
    pub fn usable(&self, on: NaiveDate) -> Decimal {
        if self.is_expired(on) {
            self.balance().min(Decimal::ZERO)
        } else {
            self.balance()
        }
    }

    /// Same amounts, expiry ignored.
    #[must_use]
    pub fn same_amounts(&self, other: &Self) -> bool {
        self.credited == other.credited && self.carried == other.carried && self.used == other.used
    }
}

/// Counters of every concrete bucket of a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSheet<B: BalanceKind> {
    buckets: BTreeMap<B, BucketCounters>,
}

impl<B: BalanceKind> Default for BalanceSheet<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BalanceKind> BalanceSheet<B> {
    /// Creates a sheet with every concrete bucket at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: B::concrete().map(|b| (b, BucketCounters::default())).collect(),
        }
    }

    /// Counters of a bucket.
    #[must_use]
    pub fn bucket(&self, bucket: B) -> BucketCounters {
        self.buckets.get(&bucket).copied().unwrap_or_default()
    }

    /// Mutable counters of a bucket.
    pub fn bucket_mut(&mut self, bucket: B) -> &mut BucketCounters {
        self.buckets.entry(bucket).or_default()
    }

    /// Balance of a type, summed over its buckets.
    #[must_use]
    pub fn balance(&self, kind: B) -> Decimal {
        kind.buckets().iter().map(|b| self.bucket(*b).balance()).sum()
    }

    /// Usable balance of a type on `on`, summed over its buckets.
    #[must_use]
    pub fn usable_balance(&self, kind: B, on: NaiveDate) -> Decimal {
        kind.buckets().iter().map(|b| self.bucket(*b).usable(on)).sum()
    }

    /// Used amount of a type, summed over its buckets.
    #[must_use]
    pub fn used(&self, kind: B) -> Decimal {
        kind.buckets().iter().map(|b| self.bucket(*b).used).sum()
    }

    /// Applies the counter effect of one ledger line.
    pub fn apply(&mut self, entry_type: LedgerEntryType, bucket: B, amount: Decimal) {
        let counters = self.bucket_mut(bucket);
        match entry_type {
            LedgerEntryType::Accrual | LedgerEntryType::AdjustmentAdd => counters.credited += amount,
            LedgerEntryType::CarryOver => counters.carried += amount,
            // usage lines are negative, reversal lines positive
            LedgerEntryType::Usage | LedgerEntryType::Reversal => counters.used -= amount,
            LedgerEntryType::Reservation => {}
        }
    }

    /// Rebuilds counters from ledger lines. Expiry dates are not restored.
    pub fn replay<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry<B>>) -> Self {
        let mut sheet = Self::new();
        for entry in entries {
            sheet.apply(entry.entry_type, entry.balance_type, entry.amount);
        }
        sheet
    }

    /// Iterates buckets in order.
    pub fn iter(&self) -> impl Iterator<Item = (B, &BucketCounters)> {
        self.buckets.iter().map(|(b, c)| (*b, c))
    }

    /// Buckets whose amounts differ from `other`.
    #[must_use]
    pub fn differing_buckets(&self, other: &Self) -> Vec<B> {
        B::concrete()
            .filter(|b| !self.bucket(*b).same_amounts(&other.bucket(*b)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::LeaveBalanceType;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_sheet_has_concrete_buckets_only() {
        let sheet = BalanceSheet::<LeaveBalanceType>::new();
        let buckets: Vec<_> = sheet.iter().map(|(b, _)| b).collect();
        assert_eq!(
            buckets,
            vec![
                LeaveBalanceType::VacationAp,
                LeaveBalanceType::VacationAc,
                LeaveBalanceType::Rol,
                LeaveBalanceType::Permits,
            ]
        );
    }

    #[test]
    fn test_apply_counter_effects() {
        let mut sheet = BalanceSheet::<LeaveBalanceType>::new();
        sheet.apply(LedgerEntryType::CarryOver, LeaveBalanceType::VacationAp, dec!(5));
        sheet.apply(LedgerEntryType::Accrual, LeaveBalanceType::VacationAc, dec!(10));
        sheet.apply(LedgerEntryType::Usage, LeaveBalanceType::VacationAp, dec!(-5));
        sheet.apply(LedgerEntryType::Usage, LeaveBalanceType::VacationAc, dec!(-3));
        sheet.apply(LedgerEntryType::Reversal, LeaveBalanceType::VacationAc, dec!(1));
        sheet.apply(LedgerEntryType::Reservation, LeaveBalanceType::VacationAc, dec!(-4));

        let ap = sheet.bucket(LeaveBalanceType::VacationAp);
        let ac = sheet.bucket(LeaveBalanceType::VacationAc);
        assert_eq!(ap.carried, dec!(5));
        assert_eq!(ap.used, dec!(5));
        assert_eq!(ac.credited, dec!(10));
        assert_eq!(ac.used, dec!(2));
        assert_eq!(sheet.balance(LeaveBalanceType::Vacation), dec!(8));
        assert_eq!(sheet.used(LeaveBalanceType::Vacation), dec!(7));
    }

    #[test]
    fn test_differing_buckets_ignores_expiry() {
        let mut a = BalanceSheet::<LeaveBalanceType>::new();
        let mut b = BalanceSheet::<LeaveBalanceType>::new();
        a.bucket_mut(LeaveBalanceType::VacationAp).expiry_date = NaiveDate::from_ymd_opt(2026, 6, 30);
        assert!(a.differing_buckets(&b).is_empty());

        b.apply(LedgerEntryType::Accrual, LeaveBalanceType::Rol, dec!(6));
        assert_eq!(a.differing_buckets(&b), vec![LeaveBalanceType::Rol]);
    }
}
