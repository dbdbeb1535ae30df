//! Expense budget categories, the second instantiation of the ledger engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::kind::{BalanceKind, BalanceUnit};
use crate::ledger::WalletError;

/// Expense budget category. Every category is its own bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseBalanceType {
    /// Travel budget.
    Travel,
    /// Meals budget.
    Meals,
    /// Equipment budget.
    Equipment,
    /// Training budget.
    Training,
}

impl BalanceKind for ExpenseBalanceType {
    const ALL: &'static [Self] = &[Self::Travel, Self::Meals, Self::Equipment, Self::Training];

    fn as_str(self) -> &'static str {
        match self {
            Self::Travel => "travel",
            Self::Meals => "meals",
            Self::Equipment => "equipment",
            Self::Training => "training",
        }
    }

    fn unit(self) -> BalanceUnit {
        BalanceUnit::Money
    }

    fn buckets(self) -> &'static [Self] {
        match self {
            Self::Travel => &[Self::Travel],
            Self::Meals => &[Self::Meals],
            Self::Equipment => &[Self::Equipment],
            Self::Training => &[Self::Training],
        }
    }
}

impl fmt::Display for ExpenseBalanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseBalanceType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| WalletError::UnknownBalanceType(s.to_string()))
    }
}
