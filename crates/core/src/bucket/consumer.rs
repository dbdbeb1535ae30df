//! The FIFO bucket consumer.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::LedgerEntryId;
use serde::Serialize;

use crate::balance::BalanceKind;
use crate::ledger::LedgerEntry;

/// View of an additive entry taking part in consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketEntry {
    /// Ledger entry id.
    pub id: LedgerEntryId,
    /// Unconsumed amount.
    pub remaining: Decimal,
    /// Expiry, `None` sorts last.
    pub expiry_date: Option<NaiveDate>,
    /// Creation timestamp, tie-breaker.
    pub created_at: DateTime<Utc>,
}

impl BucketEntry {
    /// True when the entry's deadline lies before `on`.
    #[must_use]
    pub fn is_expired(&self, on: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < on)
    }

    /// Builds the view of a ledger entry.
    #[must_use]
    pub fn from_entry<B: BalanceKind>(entry: &LedgerEntry<B>) -> Self {
        Self {
            id: entry.id,
            remaining: entry.remaining_amount,
            expiry_date: entry.expiry_date,
            created_at: entry.created_at,
        }
    }
}

/// Amount taken from one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketDraw {
    /// Consumed entry.
    pub entry_id: LedgerEntryId,
    /// Amount taken.
    pub amount: Decimal,
    /// Entry's remaining amount after the draw.
    pub remaining_after: Decimal,
}

/// Result of a consumption.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Consumption {
    /// Draws in consumption order.
    pub draws: Vec<BucketDraw>,
    /// Total taken from entries.
    pub consumed: Decimal,
    /// Part of the request no entry could cover.
    pub shortfall: Decimal,
}

impl Consumption {
    /// True when the whole request was covered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shortfall.is_zero()
    }
}

/// Stateless FIFO allocator.
pub struct BucketConsumer;

impl BucketConsumer {
    /// Consumption order: expiry ascending with no-expiry last, then creation time.
    #[must_use]
    pub fn fifo_order(a: &BucketEntry, b: &BucketEntry) -> Ordering {
        let by_expiry = match (a.expiry_date, b.expiry_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_expiry
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Greedily takes `amount` from the entries in FIFO order as of `on`.
    ///
    /// Entries are updated in place. Entries with nothing remaining, or whose
    /// expiry lies before `on`, are skipped. A non-positive amount consumes
    /// nothing.
    pub fn consume(entries: &mut [BucketEntry], amount: Decimal, on: NaiveDate) -> Consumption {
        let mut order: Vec<usize> = (0..entries.len())
            .filter(|&i| entries[i].remaining > Decimal::ZERO && !entries[i].is_expired(on))
            .collect();
        order.sort_by(|&a, &b| Self::fifo_order(&entries[a], &entries[b]));

        let requested = amount.max(Decimal::ZERO);
        let mut left = requested;
        let mut draws = Vec::new();

        for index in order {
            if left <= Decimal::ZERO {
                break;
            }
            let entry = &mut entries[index];
            let take = entry.remaining.min(left);
            entry.remaining -= take;
            left -= take;
            draws.push(BucketDraw {
                entry_id: entry.id,
                amount: take,
                remaining_after: entry.remaining,
            });
        }

        Consumption {
            draws,
            consumed: requested - left,
            shortfall: left,
        }
    }
}
