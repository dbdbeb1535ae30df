//! Delta-based monthly accrual.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::ContractId;
use serde::Serialize;
use thiserror::Error;

use super::contract::{AccrualParameters, AgreementVersion, EmployeeContract, ParameterSource};
use crate::balance::{LeaveBalanceType, quantize};
use crate::ledger::{
    LeaveBook, LedgerEntryType, PostingOutcome, Reference, ReferenceType, TransactionRequest,
    TransactionType, WalletError,
};

/// Days of a month a contract must cover for the month to accrue.
pub const MIN_COVERED_DAYS: i64 = 15;

const MONTHS_PER_YEAR: u32 = 12;

/// Why an employee cannot be accrued. The batch skips the employee.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccrualSkip {
    /// No contract covers enough days of any month up to the target month.
    #[error("No contract covers {year} up to month {month}")]
    NoContract {
        /// Year.
        year: i32,
        /// Last month considered.
        month: u32,
    },

    /// Neither an agreement version nor contract-type defaults apply.
    #[error("No accrual parameters for contract {contract_id} ({contract_type})")]
    NoParameters {
        /// Contract.
        contract_id: ContractId,
        /// Contract type code.
        contract_type: String,
    },

    /// Contractual or full-time weekly hours are not positive.
    #[error("Invalid weekly hours on contract {0}")]
    InvalidHours(ContractId),

    /// Year or month out of range.
    #[error("Invalid accrual period {year}-{month}")]
    InvalidPeriod {
        /// Year.
        year: i32,
        /// Month.
        month: u32,
    },
}

/// What one month contributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyAccrual {
    /// Month number, 1-based.
    pub month: u32,
    /// Contract covering the month.
    pub contract_id: ContractId,
    /// Contractual over full-time weekly hours.
    pub ratio: Decimal,
    /// Vacation days, unrounded.
    pub vacation_days: Decimal,
    /// ROL hours, unrounded.
    pub rol_hours: Decimal,
    /// Permit hours, unrounded.
    pub permit_hours: Decimal,
    /// Origin of the parameters.
    pub source: ParameterSource,
}

/// Absolute balances an employee should have accrued by the end of a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccrualTarget {
    /// Year.
    pub year: i32,
    /// Last month included.
    pub through_month: u32,
    /// Contributing months; months without a qualifying contract are absent.
    pub months: Vec<MonthlyAccrual>,
    /// Quantized totals per bucket.
    pub totals: BTreeMap<LeaveBalanceType, Decimal>,
    /// Pro-rated annual vacation entitlement of the latest contract.
    pub annual_vacation: Decimal,
    /// Carry-over window of the latest parameters, if defined.
    pub carryover_months: Option<u32>,
}

impl AccrualTarget {
    /// Idempotency reference of the run, `YYYY-MM`.
    #[must_use]
    pub fn reference_id(&self) -> String {
        format!("{}-{:02}", self.year, self.through_month)
    }

    /// Target of one bucket.
    #[must_use]
    pub fn total(&self, bucket: LeaveBalanceType) -> Decimal {
        self.totals.get(&bucket).copied().unwrap_or_default()
    }
}

/// Difference between target and what earlier runs posted on one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccrualDelta {
    /// Bucket.
    pub balance_type: LeaveBalanceType,
    /// Absolute target.
    pub target: Decimal,
    /// Accrued by earlier runs.
    pub current: Decimal,
    /// `target - current`.
    pub delta: Decimal,
}

/// Postings needed to bring a wallet to its accrual target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccrualPlan {
    /// The target.
    pub target: AccrualTarget,
    /// Non-zero deltas.
    pub deltas: Vec<AccrualDelta>,
}

impl AccrualPlan {
    /// True when the wallet is already at target.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Accrual transactions for the non-zero deltas.
    ///
    /// # Errors
    ///
    /// Never in practice; the reference id is built from the period.
    pub fn requests(&self) -> Result<Vec<TransactionRequest<LeaveBalanceType>>, WalletError> {
        let reference_id = self.target.reference_id();
        self.deltas
            .iter()
            .map(|delta| {
                Ok(TransactionRequest::new(
                    TransactionType::Accrual,
                    delta.balance_type,
                    delta.delta,
                )
                .with_reference(Reference::new(ReferenceType::Accrual, reference_id.clone())?)
                .with_description(format!("Monthly accrual {reference_id}")))
            })
            .collect()
    }
}

/// Monthly pro-rata accrual calculator.
pub struct AccrualCalculator;

impl AccrualCalculator {
    /// Buckets the calculator accrues.
    pub const BUCKETS: [LeaveBalanceType; 3] = [
        LeaveBalanceType::VacationAc,
        LeaveBalanceType::Rol,
        LeaveBalanceType::Permits,
    ];

    /// First and last day of a month.
    #[must_use]
    pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == MONTHS_PER_YEAR {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some((first, next.pred_opt()?))
    }

    /// The contract covering the most days of the month, if it covers at
    /// least [`MIN_COVERED_DAYS`].
    ///
    /// Ties go to the contract that started last.
    #[must_use]
    pub fn contract_for_month(
        contracts: &[EmployeeContract],
        year: i32,
        month: u32,
    ) -> Option<&EmployeeContract> {
        let (first, last) = Self::month_bounds(year, month)?;
        contracts
            .iter()
            .map(|c| (c.covered_days(first, last), c))
            .filter(|(days, _)| *days >= MIN_COVERED_DAYS)
            .max_by(|(da, a), (db, b)| da.cmp(db).then(a.start_date.cmp(&b.start_date)))
            .map(|(_, c)| c)
    }

    /// Contractual over full-time weekly hours.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHours` if either side is not positive.
    pub fn ratio(
        contract: &EmployeeContract,
        params: &AccrualParameters,
    ) -> Result<Decimal, AccrualSkip> {
        if contract.weekly_hours <= Decimal::ZERO || params.full_time_weekly_hours <= Decimal::ZERO {
            return Err(AccrualSkip::InvalidHours(contract.id));
        }
        Ok(contract.weekly_hours / params.full_time_weekly_hours)
    }

    /// Target balances accrued from January through `through_month`.
    ///
    /// Each month contributes `annual * ratio / 12` under the contract and
    /// parameters in force at the start of the month. Totals are summed
    /// unrounded and quantized once per bucket.
    ///
    /// # Errors
    ///
    /// Returns an [`AccrualSkip`] when the employee cannot be accrued.
    pub fn target(
        contracts: &[EmployeeContract],
        versions: &[AgreementVersion],
        year: i32,
        through_month: u32,
    ) -> Result<AccrualTarget, AccrualSkip> {
        if !(1..=MONTHS_PER_YEAR).contains(&through_month) || Self::month_bounds(year, 1).is_none() {
            return Err(AccrualSkip::InvalidPeriod {
                year,
                month: through_month,
            });
        }

        let mut months = Vec::new();
        let mut vacation = Decimal::ZERO;
        let mut rol = Decimal::ZERO;
        let mut permits = Decimal::ZERO;
        let mut latest: Option<(Decimal, AccrualParameters)> = None;

        for month in 1..=through_month {
            let Some(contract) = Self::contract_for_month(contracts, year, month) else {
                continue;
            };
            let Some((first, _)) = Self::month_bounds(year, month) else {
                continue;
            };
            let params = AccrualParameters::resolve(contract, versions, first).ok_or_else(|| {
                AccrualSkip::NoParameters {
                    contract_id: contract.id,
                    contract_type: contract.contract_type.clone(),
                }
            })?;
            let ratio = Self::ratio(contract, &params)?;

            let twelve = Decimal::from(MONTHS_PER_YEAR);
            let month_vacation = params.annual_vacation_days * ratio;
            let month_rol = params.annual_rol_hours * ratio;
            let month_permits = params.annual_permit_hours * ratio;
            vacation += month_vacation;
            rol += month_rol;
            permits += month_permits;

            months.push(MonthlyAccrual {
                month,
                contract_id: contract.id,
                ratio,
                vacation_days: month_vacation / twelve,
                rol_hours: month_rol / twelve,
                permit_hours: month_permits / twelve,
                source: params.source,
            });
            latest = Some((ratio, params));
        }

        let Some((ratio, params)) = latest else {
            return Err(AccrualSkip::NoContract {
                year,
                month: through_month,
            });
        };

        let twelve = Decimal::from(MONTHS_PER_YEAR);
        let totals = [
            (LeaveBalanceType::VacationAc, vacation / twelve),
            (LeaveBalanceType::Rol, rol / twelve),
            (LeaveBalanceType::Permits, permits / twelve),
        ]
        .into_iter()
        .map(|(bucket, value)| (bucket, quantize(bucket, value)))
        .collect();

        Ok(AccrualTarget {
            year,
            through_month,
            months,
            totals,
            annual_vacation: quantize(
                LeaveBalanceType::VacationAc,
                params.annual_vacation_days * ratio,
            ),
            carryover_months: params.carryover_months,
        })
    }

    /// What earlier accrual runs posted on a bucket.
    ///
    /// Manual accruals (without an accrual-run reference) are not counted, so
    /// they survive recalculation.
    #[must_use]
    pub fn accrued_by_runs(book: &LeaveBook, bucket: LeaveBalanceType) -> Decimal {
        book.entries()
            .iter()
            .filter(|e| e.entry_type == LedgerEntryType::Accrual && e.balance_type == bucket)
            .filter(|e| {
                e.reference
                    .as_ref()
                    .is_some_and(|r| r.reference_type == ReferenceType::Accrual)
            })
            .map(|e| e.amount)
            .sum()
    }

    /// Deltas bringing the book to the target.
    #[must_use]
    pub fn plan(book: &LeaveBook, target: AccrualTarget) -> AccrualPlan {
        let deltas = Self::BUCKETS
            .iter()
            .map(|bucket| {
                let current = Self::accrued_by_runs(book, *bucket);
                let target = target.total(*bucket);
                AccrualDelta {
                    balance_type: *bucket,
                    target,
                    current,
                    delta: target - current,
                }
            })
            .filter(|d| !d.delta.is_zero())
            .collect();
        AccrualPlan { target, deltas }
    }

    /// Posts the plan and records the annual entitlement.
    ///
    /// # Errors
    ///
    /// Returns the first posting error; the book may then hold partial
    /// changes and must be discarded.
    pub fn apply(
        book: &mut LeaveBook,
        plan: &AccrualPlan,
        now: DateTime<Utc>,
    ) -> Result<Vec<PostingOutcome<LeaveBalanceType>>, WalletError> {
        if !plan.is_empty() && book.wallet().is_closed() {
            return Err(book.wallet().closed_error());
        }
        book.set_entitlement(LeaveBalanceType::VacationAc, plan.target.annual_vacation);
        plan.requests()?
            .into_iter()
            .map(|request| book.post(request, now))
            .collect()
    }

    /// Carry-over window from the parameters in force on 31 December.
    #[must_use]
    pub fn carryover_months(
        contracts: &[EmployeeContract],
        versions: &[AgreementVersion],
        year: i32,
    ) -> Option<u32> {
        let year_end = NaiveDate::from_ymd_opt(year, MONTHS_PER_YEAR, 31)?;
        contracts
            .iter()
            .filter(|c| c.start_date <= year_end)
            .max_by_key(|c| c.start_date)
            .and_then(|c| AccrualParameters::from_agreement(c, versions, year_end))
            .and_then(|p| p.carryover_months)
    }

    /// Month of a date, for callers accruing "up to today".
    #[must_use]
    pub fn current_month(now: DateTime<Utc>) -> (i32, u32) {
        (now.year(), now.month())
    }
}
