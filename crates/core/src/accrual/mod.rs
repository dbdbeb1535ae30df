//! Monthly pro-rata accrual.
//!
//! The calculator resolves, for every month up to the requested one, the
//! contract covering the month and the entitlement parameters in force, then
//! derives the absolute target balance. Only the difference between target and
//! what earlier runs posted is written, so recalculation is idempotent.

pub mod calculator;
pub mod contract;
pub mod directory;

#[cfg(test)]
mod calculator_props;

pub use calculator::{
    AccrualCalculator, AccrualDelta, AccrualPlan, AccrualSkip, AccrualTarget, MIN_COVERED_DAYS,
    MonthlyAccrual,
};
pub use contract::{AccrualParameters, AgreementVersion, EmployeeContract, ParameterSource};
pub use directory::{ContractDirectory, DirectoryError};
