//! Contracts, labor-agreement versions and the entitlement parameters they yield.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use saldo_shared::types::{AgreementId, ContractId, UserId};
use serde::{Deserialize, Serialize};

/// An employment contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeContract {
    /// Contract id.
    pub id: ContractId,
    /// Employee.
    pub user_id: UserId,
    /// Contract type code (`FULL_TIME`, `PART_TIME`, ...).
    pub contract_type: String,
    /// First day covered.
    pub start_date: NaiveDate,
    /// Last day covered; open-ended when `None`.
    pub end_date: Option<NaiveDate>,
    /// Contractual weekly hours.
    pub weekly_hours: Decimal,
    /// Linked labor agreement.
    pub agreement_id: Option<AgreementId>,
}

impl EmployeeContract {
    /// Number of days of `[first, last]` the contract covers.
    #[must_use]
    pub fn covered_days(&self, first: NaiveDate, last: NaiveDate) -> i64 {
        let start = self.start_date.max(first);
        let end = self.end_date.map_or(last, |end| end.min(last));
        if end < start {
            0
        } else {
            (end - start).num_days() + 1
        }
    }

    /// True when the contract covers the date.
    #[must_use]
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.end_date.is_none_or(|end| date <= end)
    }
}

/// A time-bounded version of a labor agreement (CCNL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementVersion {
    /// Agreement the version belongs to.
    pub agreement_id: AgreementId,
    /// First day in force.
    pub valid_from: NaiveDate,
    /// Last day in force; open-ended when `None`.
    pub valid_to: Option<NaiveDate>,
    /// Annual vacation days for a full-time employee.
    pub annual_vacation_days: Decimal,
    /// Annual ROL hours for a full-time employee.
    pub annual_rol_hours: Decimal,
    /// Annual permit hours for a full-time employee.
    pub annual_permit_hours: Decimal,
    /// Weekly hours of a full-time employee.
    pub full_time_weekly_hours: Decimal,
    /// Months after year end during which carried-over vacation can be used.
    pub carryover_months: Option<u32>,
}

impl AgreementVersion {
    /// True when the version is in force on the date.
    #[must_use]
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && self.valid_to.is_none_or(|to| date <= to)
    }
}

/// Where accrual parameters came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSource {
    /// An agreement version linked to the contract.
    AgreementVersion,
    /// Static defaults of the contract type.
    ContractDefaults,
}

/// Annual entitlements and the full-time baseline used for pro-rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccrualParameters {
    /// Annual vacation days.
    pub annual_vacation_days: Decimal,
    /// Annual ROL hours.
    pub annual_rol_hours: Decimal,
    /// Annual permit hours.
    pub annual_permit_hours: Decimal,
    /// Full-time weekly hours.
    pub full_time_weekly_hours: Decimal,
    /// Carry-over window, when the source defines one.
    pub carryover_months: Option<u32>,
    /// Origin of the values.
    pub source: ParameterSource,
}

impl AccrualParameters {
    /// Static defaults of a contract type, `None` for unknown types.
    #[must_use]
    pub fn for_contract_type(contract_type: &str) -> Option<Self> {
        let annual_rol_hours = match contract_type {
            "FULL_TIME" | "PART_TIME" | "FIXED_TERM" => dec!(72),
            "APPRENTICE" => dec!(56),
            _ => return None,
        };
        Some(Self {
            annual_vacation_days: dec!(26),
            annual_rol_hours,
            annual_permit_hours: dec!(32),
            full_time_weekly_hours: dec!(40),
            carryover_months: None,
            source: ParameterSource::ContractDefaults,
        })
    }

    /// Parameters of the contract's agreement version in force on `on`.
    ///
    /// When several versions match, the most recent `valid_from` wins.
    #[must_use]
    pub fn from_agreement(
        contract: &EmployeeContract,
        versions: &[AgreementVersion],
        on: NaiveDate,
    ) -> Option<Self> {
        let agreement_id = contract.agreement_id?;
        versions
            .iter()
            .filter(|v| v.agreement_id == agreement_id && v.is_valid_on(on))
            .max_by_key(|v| v.valid_from)
            .map(|v| Self {
                annual_vacation_days: v.annual_vacation_days,
                annual_rol_hours: v.annual_rol_hours,
                annual_permit_hours: v.annual_permit_hours,
                full_time_weekly_hours: v.full_time_weekly_hours,
                carryover_months: v.carryover_months,
                source: ParameterSource::AgreementVersion,
            })
    }

    /// Agreement version first, contract-type defaults second.
    #[must_use]
    pub fn resolve(
        contract: &EmployeeContract,
        versions: &[AgreementVersion],
        on: NaiveDate,
    ) -> Option<Self> {
        Self::from_agreement(contract, versions, on)
            .or_else(|| Self::for_contract_type(&contract.contract_type))
    }
}
