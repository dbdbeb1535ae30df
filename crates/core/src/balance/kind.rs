//! The balance-kind abstraction the ledger engine is generic over.

use std::fmt;
use std::hash::Hash;

use serde::{Serialize, de::DeserializeOwned};

/// Unit a balance is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceUnit {
    /// Whole or half days, one decimal place.
    Days,
    /// Hours, two decimal places.
    Hours,
    /// Currency amounts, two decimal places.
    Money,
}

impl BalanceUnit {
    /// Number of decimal places amounts in this unit carry.
    #[must_use]
    pub const fn scale(self) -> u32 {
        match self {
            Self::Days => 1,
            Self::Hours | Self::Money => 2,
        }
    }
}

/// A balance-type enum usable by the generic ledger engine.
///
/// Every variant is either a concrete *bucket* (ledger lines and counters are
/// kept per bucket) or a request-level alias that resolves to an ordered list
/// of buckets. The order of [`BalanceKind::buckets`] is the depletion order.
pub trait BalanceKind:
    Copy
    + Eq
    + Ord
    + Hash
    + fmt::Debug
    + fmt::Display
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Every variant, aliases included.
    const ALL: &'static [Self];

    /// Stable string code used in storage and on the wire.
    fn as_str(self) -> &'static str;

    /// Unit of the balance.
    fn unit(self) -> BalanceUnit;

    /// Concrete buckets this type resolves to, in depletion order.
    fn buckets(self) -> &'static [Self];

    /// Parses a string code.
    fn parse(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == code)
    }

    /// Decimal places allowed for amounts of this type.
    fn scale(self) -> u32 {
        self.unit().scale()
    }

    /// True when ledger lines can be stored against this type directly.
    fn is_concrete(self) -> bool {
        matches!(self.buckets(), [only] if *only == self)
    }

    /// Bucket receiving accruals and adjustments (the last in depletion order).
    fn credit_bucket(self) -> Self {
        self.buckets().last().copied().unwrap_or(self)
    }

    /// Bucket receiving carry-overs (the first in depletion order).
    fn carry_bucket(self) -> Self {
        self.buckets().first().copied().unwrap_or(self)
    }

    /// True when both types share at least one bucket.
    fn overlaps(self, other: Self) -> bool {
        self.buckets().iter().any(|b| other.buckets().contains(b))
    }

    /// All concrete buckets.
    fn concrete() -> impl Iterator<Item = Self> {
        Self::ALL.iter().copied().filter(|kind| kind.is_concrete())
    }
}
