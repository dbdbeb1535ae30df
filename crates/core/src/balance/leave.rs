//! Leave balance types: vacation (AP/AC buckets), ROL and permits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::kind::{BalanceKind, BalanceUnit};
use crate::ledger::WalletError;

/// Leave balance type.
///
/// `Vacation` is a request-level alias for the prior-year (`VacationAp`) and
/// current-year (`VacationAc`) buckets, consumed in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveBalanceType {
    /// Vacation days, AP first then AC.
    Vacation,
    /// Prior-year vacation bucket (Anno Precedente), subject to expiry.
    VacationAp,
    /// Current-year vacation bucket (Anno Corrente).
    VacationAc,
    /// Reduced-working-hours bank, in hours.
    Rol,
    /// Permit hours.
    Permits,
}

impl BalanceKind for LeaveBalanceType {
    const ALL: &'static [Self] = &[
        Self::Vacation,
        Self::VacationAp,
        Self::VacationAc,
        Self::Rol,
        Self::Permits,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Vacation => "vacation",
            Self::VacationAp => "vacation_ap",
            Self::VacationAc => "vacation_ac",
            Self::Rol => "rol",
            Self::Permits => "permits",
        }
    }

    fn unit(self) -> BalanceUnit {
        match self {
            Self::Vacation | Self::VacationAp | Self::VacationAc => BalanceUnit::Days,
            Self::Rol | Self::Permits => BalanceUnit::Hours,
        }
    }

    fn buckets(self) -> &'static [Self] {
        match self {
            Self::Vacation => &[Self::VacationAp, Self::VacationAc],
            Self::VacationAp => &[Self::VacationAp],
            Self::VacationAc => &[Self::VacationAc],
            Self::Rol => &[Self::Rol],
            Self::Permits => &[Self::Permits],
        }
    }
}

impl fmt::Display for LeaveBalanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaveBalanceType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| WalletError::UnknownBalanceType(s.to_string()))
    }
}
