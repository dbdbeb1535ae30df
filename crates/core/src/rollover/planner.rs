//! Rollover planning and application.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::accrual::AccrualCalculator;
use crate::balance::LeaveBalanceType;
use crate::ledger::{
    LeaveBook, LedgerEntryType, PostingOutcome, Reference, ReferenceType, TransactionRequest,
    TransactionType, WalletError,
};

/// Carry-over window when no agreement version defines one.
pub const DEFAULT_CARRYOVER_MONTHS: u32 = 18;

/// Deadline of vacation carried out of `from_year`: the last day of the month
/// `months` months after 31 December.
///
/// 18 months from 2024 is 30 June 2026.
#[must_use]
pub fn carryover_expiry(from_year: i32, months: u32) -> Option<NaiveDate> {
    if months == 0 {
        return NaiveDate::from_ymd_opt(from_year, 12, 31);
    }
    let offset = i32::try_from((months - 1) / 12).ok()?;
    let year = from_year.checked_add(1)?.checked_add(offset)?;
    let month = (months - 1) % 12 + 1;
    AccrualCalculator::month_bounds(year, month).map(|(_, last)| last)
}

/// One balance moved to the next year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloverLine {
    /// Bucket of the source wallet the leftover comes from.
    pub source: LeaveBalanceType,
    /// Bucket of the target wallet it lands in.
    pub target: LeaveBalanceType,
    /// Leftover, positive.
    pub amount: Decimal,
    /// Idempotency key, `vacation:<year>` or `rol:<year>`.
    pub reference_id: String,
    /// Deadline of the carried balance.
    pub expiry_date: Option<NaiveDate>,
}

/// The carry-over of one employee from one year to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloverPlan {
    /// Source year.
    pub from_year: i32,
    /// Target year.
    pub to_year: i32,
    /// Vacation deadline.
    pub expiry_date: Option<NaiveDate>,
    /// Leftovers to post; empty when nothing is left.
    pub lines: Vec<RolloverLine>,
}

impl RolloverPlan {
    /// Carry-over transactions for the target wallet.
    ///
    /// # Errors
    ///
    /// Never in practice; reference ids are built from the year.
    pub fn requests(&self) -> Result<Vec<TransactionRequest<LeaveBalanceType>>, WalletError> {
        self.lines
            .iter()
            .map(|line| {
                let mut request =
                    TransactionRequest::new(TransactionType::CarryOver, line.target, line.amount)
                        .with_reference(Reference::new(
                            ReferenceType::Rollover,
                            line.reference_id.clone(),
                        )?)
                        .with_description(format!("Carry-over from {}", self.from_year));
                if let Some(expiry) = line.expiry_date {
                    request = request.with_expiry(expiry);
                }
                Ok(request)
            })
            .collect()
    }

    /// Total carried per target bucket.
    #[must_use]
    pub fn amount(&self, target: LeaveBalanceType) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.target == target)
            .map(|l| l.amount)
            .sum()
    }
}

/// Year-end rollover planner.
pub struct RolloverPlanner;

impl RolloverPlanner {
    fn reference_id(prefix: &str, from_year: i32) -> String {
        format!("{prefix}:{from_year}")
    }

    /// True when the transition `from_year -> from_year + 1` already ran.
    #[must_use]
    pub fn already_rolled(source: &LeaveBook, target: &LeaveBook) -> bool {
        if source.wallet().is_closed() {
            return true;
        }
        let from_year = source.wallet().year;
        ["vacation", "rol"].iter().any(|prefix| {
            Reference::new(ReferenceType::Rollover, Self::reference_id(prefix, from_year))
                .is_ok_and(|reference| {
                    !target
                        .postings_for(LedgerEntryType::CarryOver, &reference)
                        .is_empty()
                })
        })
    }

    /// Plans the carry-over of `source` into `target`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRollover` when the transition already ran and
    /// `InvalidYear` when `target` is not the year after `source`.
    pub fn plan(
        source: &LeaveBook,
        target: &LeaveBook,
        carryover_months: u32,
    ) -> Result<RolloverPlan, WalletError> {
        let from = source.wallet();
        if target.wallet().year != from.year + 1 || target.wallet().user_id != from.user_id {
            return Err(WalletError::InvalidYear(target.wallet().year));
        }
        if Self::already_rolled(source, target) {
            return Err(WalletError::DuplicateRollover {
                user_id: from.user_id.into_inner(),
                from_year: from.year,
            });
        }

        let expiry_date = carryover_expiry(from.year, carryover_months);
        let mut lines = Vec::new();

        let vacation = from.sheet.balance(LeaveBalanceType::VacationAc);
        if vacation > Decimal::ZERO {
            lines.push(RolloverLine {
                source: LeaveBalanceType::VacationAc,
                target: LeaveBalanceType::VacationAp,
                amount: vacation,
                reference_id: Self::reference_id("vacation", from.year),
                expiry_date,
            });
        }

        let rol = from.sheet.balance(LeaveBalanceType::Rol);
        if rol > Decimal::ZERO {
            lines.push(RolloverLine {
                source: LeaveBalanceType::Rol,
                target: LeaveBalanceType::Rol,
                amount: rol,
                reference_id: Self::reference_id("rol", from.year),
                expiry_date: None,
            });
        }

        Ok(RolloverPlan {
            from_year: from.year,
            to_year: from.year + 1,
            expiry_date,
            lines,
        })
    }

    /// Posts the plan onto `target` and closes `source`.
    ///
    /// # Errors
    ///
    /// Returns the first posting error; both books must then be discarded.
    pub fn apply(
        source: &mut LeaveBook,
        target: &mut LeaveBook,
        plan: &RolloverPlan,
        now: DateTime<Utc>,
    ) -> Result<Vec<PostingOutcome<LeaveBalanceType>>, WalletError> {
        let outcomes = plan
            .requests()?
            .into_iter()
            .map(|request| target.post(request, now))
            .collect::<Result<Vec<_>, _>>()?;
        source.close();
        Ok(outcomes)
    }
}
