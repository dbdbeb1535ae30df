//! Leave wallet projection: named counter columns, typed patches, snapshots.
//!
//! The engine keeps counters per bucket. Storage and the API expose the
//! historical named columns, mapped as follows:
//!
//! | Column | Buckets |
//! |---|---|
//! | `vacation_previous_year` | AP credited + carried |
//! | `vacation_accrued` | AC credited + carried |
//! | `vacation_used_ap` / `vacation_used_ac` | AP / AC used |
//! | `rol_previous_year` / `rol_accrued` / `rol_used` | ROL carried / credited / used |
//! | `permits_total` / `permits_used` | permits credited + carried / used |
//! | `ap_expiry_date` | AP expiry |
//! | `vacation_current_year` | annual entitlement, informational |

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use saldo_shared::types::{UserId, WalletId};
use serde::{Deserialize, Serialize};

use super::book::WalletBook;
use super::entry::LedgerEntry;
use super::sheet::BalanceSheet;
use super::wallet::{Wallet, WalletStatus};
use crate::balance::LeaveBalanceType;
use crate::reservation::Reservation;

/// Leave wallet.
pub type LeaveWallet = Wallet<LeaveBalanceType>;
/// Leave ledger line.
pub type LeaveEntry = LedgerEntry<LeaveBalanceType>;
/// Leave wallet book.
pub type LeaveBook = WalletBook<LeaveBalanceType>;
/// Leave reservation.
pub type LeaveReservation = Reservation<LeaveBalanceType>;

/// Named counter columns of a leave wallet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeaveCounters {
    /// Prior-year vacation days credited.
    pub vacation_previous_year: Decimal,
    /// Annual vacation entitlement.
    pub vacation_current_year: Decimal,
    /// Current-year vacation days accrued.
    pub vacation_accrued: Decimal,
    /// Prior-year days used.
    pub vacation_used_ap: Decimal,
    /// Current-year days used.
    pub vacation_used_ac: Decimal,
    /// ROL hours carried from the previous year.
    pub rol_previous_year: Decimal,
    /// ROL hours accrued.
    pub rol_accrued: Decimal,
    /// ROL hours used.
    pub rol_used: Decimal,
    /// Permit hours credited.
    pub permits_total: Decimal,
    /// Permit hours used.
    pub permits_used: Decimal,
    /// Deadline of the prior-year bucket.
    pub ap_expiry_date: Option<NaiveDate>,
    /// Wallet status.
    pub status: WalletStatus,
}

/// Ledger-backed columns, in storage order.
const LEDGER_COLUMNS: [&str; 9] = [
    "vacation_previous_year",
    "vacation_accrued",
    "vacation_used_ap",
    "vacation_used_ac",
    "rol_previous_year",
    "rol_accrued",
    "rol_used",
    "permits_total",
    "permits_used",
];

impl LeaveCounters {
    /// Projects a wallet onto the named columns.
    #[must_use]
    pub fn from_wallet(wallet: &LeaveWallet) -> Self {
        let sheet = &wallet.sheet;
        let ap = sheet.bucket(LeaveBalanceType::VacationAp);
        let ac = sheet.bucket(LeaveBalanceType::VacationAc);
        let rol = sheet.bucket(LeaveBalanceType::Rol);
        let permits = sheet.bucket(LeaveBalanceType::Permits);

        Self {
            vacation_previous_year: ap.credited + ap.carried,
            vacation_current_year: wallet
                .entitlements
                .get(&LeaveBalanceType::VacationAc)
                .copied()
                .unwrap_or_default(),
            vacation_accrued: ac.credited + ac.carried,
            vacation_used_ap: ap.used,
            vacation_used_ac: ac.used,
            rol_previous_year: rol.carried,
            rol_accrued: rol.credited,
            rol_used: rol.used,
            permits_total: permits.credited + permits.carried,
            permits_used: permits.used,
            ap_expiry_date: ap.expiry_date,
            status: wallet.status,
        }
    }

    /// Rebuilds a wallet from stored columns.
    ///
    /// The columns keep one total per vacation bucket, so prior-year days
    /// come back as AP `carried` and current-year days as AC `credited`.
    /// Balances and columns survive the trip; the carried/credited split of
    /// those two buckets does not.
    #[must_use]
    pub fn into_wallet(self, id: WalletId, user_id: UserId, year: i32) -> LeaveWallet {
        let mut sheet = BalanceSheet::new();
        {
            let ap = sheet.bucket_mut(LeaveBalanceType::VacationAp);
            ap.carried = self.vacation_previous_year;
            ap.used = self.vacation_used_ap;
            ap.expiry_date = self.ap_expiry_date;
        }
        {
            let ac = sheet.bucket_mut(LeaveBalanceType::VacationAc);
            ac.credited = self.vacation_accrued;
            ac.used = self.vacation_used_ac;
        }
        {
            let rol = sheet.bucket_mut(LeaveBalanceType::Rol);
            rol.carried = self.rol_previous_year;
            rol.credited = self.rol_accrued;
            rol.used = self.rol_used;
        }
        {
            let permits = sheet.bucket_mut(LeaveBalanceType::Permits);
            permits.credited = self.permits_total;
            permits.used = self.permits_used;
        }

        let mut entitlements = BTreeMap::new();
        if !self.vacation_current_year.is_zero() {
            entitlements.insert(LeaveBalanceType::VacationAc, self.vacation_current_year);
        }

        Wallet {
            id,
            user_id,
            year,
            status: self.status,
            sheet,
            entitlements,
        }
    }

    fn ledger_values(&self) -> [Decimal; 9] {
        [
            self.vacation_previous_year,
            self.vacation_accrued,
            self.vacation_used_ap,
            self.vacation_used_ac,
            self.rol_previous_year,
            self.rol_accrued,
            self.rol_used,
            self.permits_total,
            self.permits_used,
        ]
    }

    /// Ledger-backed columns whose values differ: `(column, self, other)`.
    #[must_use]
    pub fn ledger_mismatches(&self, other: &Self) -> Vec<(&'static str, Decimal, Decimal)> {
        LEDGER_COLUMNS
            .iter()
            .zip(self.ledger_values().into_iter().zip(other.ledger_values()))
            .filter(|(_, (mine, theirs))| mine != theirs)
            .map(|(column, (mine, theirs))| (*column, mine, theirs))
            .collect()
    }

    /// AP balance.
    #[must_use]
    pub fn vacation_available_ap(&self) -> Decimal {
        self.vacation_previous_year - self.vacation_used_ap
    }

    /// AC balance.
    #[must_use]
    pub fn vacation_available_ac(&self) -> Decimal {
        self.vacation_accrued - self.vacation_used_ac
    }

    /// ROL balance.
    #[must_use]
    pub fn rol_available(&self) -> Decimal {
        self.rol_previous_year + self.rol_accrued - self.rol_used
    }

    /// Permits balance.
    #[must_use]
    pub fn permits_available(&self) -> Decimal {
        self.permits_total - self.permits_used
    }
}

/// Column-level update of a leave wallet. `None` leaves a column untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WalletPatch {
    /// New `vacation_previous_year`.
    pub vacation_previous_year: Option<Decimal>,
    /// New `vacation_current_year`.
    pub vacation_current_year: Option<Decimal>,
    /// New `vacation_accrued`.
    pub vacation_accrued: Option<Decimal>,
    /// New `vacation_used_ap`.
    pub vacation_used_ap: Option<Decimal>,
    /// New `vacation_used_ac`.
    pub vacation_used_ac: Option<Decimal>,
    /// New `rol_previous_year`.
    pub rol_previous_year: Option<Decimal>,
    /// New `rol_accrued`.
    pub rol_accrued: Option<Decimal>,
    /// New `rol_used`.
    pub rol_used: Option<Decimal>,
    /// New `permits_total`.
    pub permits_total: Option<Decimal>,
    /// New `permits_used`.
    pub permits_used: Option<Decimal>,
    /// New `ap_expiry_date` (which may be a clear).
    pub ap_expiry_date: Option<Option<NaiveDate>>,
    /// New status.
    pub status: Option<WalletStatus>,
}

fn changed<T: PartialEq + Clone>(before: &T, after: &T) -> Option<T> {
    (before != after).then(|| after.clone())
}

impl WalletPatch {
    /// Columns that differ between two projections.
    #[must_use]
    pub fn diff(before: &LeaveCounters, after: &LeaveCounters) -> Self {
        Self {
            vacation_previous_year: changed(&before.vacation_previous_year, &after.vacation_previous_year),
            vacation_current_year: changed(&before.vacation_current_year, &after.vacation_current_year),
            vacation_accrued: changed(&before.vacation_accrued, &after.vacation_accrued),
            vacation_used_ap: changed(&before.vacation_used_ap, &after.vacation_used_ap),
            vacation_used_ac: changed(&before.vacation_used_ac, &after.vacation_used_ac),
            rol_previous_year: changed(&before.rol_previous_year, &after.rol_previous_year),
            rol_accrued: changed(&before.rol_accrued, &after.rol_accrued),
            rol_used: changed(&before.rol_used, &after.rol_used),
            permits_total: changed(&before.permits_total, &after.permits_total),
            permits_used: changed(&before.permits_used, &after.permits_used),
            ap_expiry_date: changed(&before.ap_expiry_date, &after.ap_expiry_date),
            status: changed(&before.status, &after.status),
        }
    }

    /// True when no column changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies the patch to a projection.
    #[must_use]
    pub fn apply(&self, counters: &LeaveCounters) -> LeaveCounters {
        let mut next = counters.clone();
        if let Some(v) = self.vacation_previous_year {
            next.vacation_previous_year = v;
        }
        if let Some(v) = self.vacation_current_year {
            next.vacation_current_year = v;
        }
        if let Some(v) = self.vacation_accrued {
            next.vacation_accrued = v;
        }
        if let Some(v) = self.vacation_used_ap {
            next.vacation_used_ap = v;
        }
        if let Some(v) = self.vacation_used_ac {
            next.vacation_used_ac = v;
        }
        if let Some(v) = self.rol_previous_year {
            next.rol_previous_year = v;
        }
        if let Some(v) = self.rol_accrued {
            next.rol_accrued = v;
        }
        if let Some(v) = self.rol_used {
            next.rol_used = v;
        }
        if let Some(v) = self.permits_total {
            next.permits_total = v;
        }
        if let Some(v) = self.permits_used {
            next.permits_used = v;
        }
        if let Some(v) = self.ap_expiry_date {
            next.ap_expiry_date = v;
        }
        if let Some(v) = self.status {
            next.status = v;
        }
        next
    }
}

/// Wallet as returned by the API: every counter plus derived availables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSnapshot {
    /// Owner.
    pub user_id: UserId,
    /// Fiscal year.
    pub year: i32,
    /// Named columns.
    #[serde(flatten)]
    pub counters: LeaveCounters,
    /// `previous_year - used_ap`; nothing once `ap_expiry_date` has passed.
    pub vacation_available_ap: Decimal,
    /// `accrued - used_ac`.
    pub vacation_available_ac: Decimal,
    /// AP + AC balance.
    pub vacation_available: Decimal,
    /// ROL balance.
    pub rol_available: Decimal,
    /// Permits balance.
    pub permits_available: Decimal,
    /// Active reservations per reserved balance type.
    pub reserved: BTreeMap<LeaveBalanceType, Decimal>,
}

impl WalletSnapshot {
    /// Builds the snapshot of a wallet.
    #[must_use]
    pub fn new(wallet: &LeaveWallet, reserved: BTreeMap<LeaveBalanceType, Decimal>) -> Self {
        let counters = LeaveCounters::from_wallet(wallet);
        Self {
            user_id: wallet.user_id,
            year: wallet.year,
            vacation_available_ap: counters.vacation_available_ap(),
            vacation_available_ac: counters.vacation_available_ac(),
            vacation_available: counters.vacation_available_ap() + counters.vacation_available_ac(),
            rol_available: counters.rol_available(),
            permits_available: counters.permits_available(),
            reserved,
            counters,
        }
    }

    /// Builds the snapshot of a book, summing active reservations at `now`.
    ///
    /// Prior-year days past their deadline are not available.
    #[must_use]
    pub fn from_book(book: &LeaveBook, now: chrono::DateTime<chrono::Utc>) -> Self {
        let mut reserved = BTreeMap::new();
        for reservation in book.reservations().iter().filter(|r| r.is_active(now)) {
            *reserved.entry(reservation.balance_type).or_insert(Decimal::ZERO) += reservation.amount;
        }
        let mut snapshot = Self::new(book.wallet(), reserved);
        let ap = book.wallet().sheet.bucket(LeaveBalanceType::VacationAp);
        if ap.is_expired(now.date_naive()) {
            snapshot.vacation_available_ap = ap.usable(now.date_naive());
            snapshot.vacation_available = snapshot.vacation_available_ap + snapshot.vacation_available_ac;
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::BalanceKind;
    use crate::ledger::{LedgerEntryType, TransactionRequest, TransactionType};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn counters() -> LeaveCounters {
        LeaveCounters {
            vacation_previous_year: dec!(5),
            vacation_current_year: dec!(26),
            vacation_accrued: dec!(10),
            vacation_used_ap: dec!(5),
            vacation_used_ac: dec!(3),
            rol_previous_year: dec!(4),
            rol_accrued: dec!(12),
            rol_used: dec!(6.5),
            permits_total: dec!(8),
            permits_used: dec!(2),
            ap_expiry_date: NaiveDate::from_ymd_opt(2025, 6, 30),
            status: WalletStatus::Active,
        }
    }

    #[test]
    fn test_columns_round_trip_through_wallet() {
        let wallet = counters().into_wallet(WalletId::new(), UserId::new(), 2025);
        assert_eq!(LeaveCounters::from_wallet(&wallet), counters());
        assert_eq!(wallet.balance(LeaveBalanceType::Vacation), dec!(7));
        assert_eq!(wallet.balance(LeaveBalanceType::Rol), dec!(9.5));
    }

    #[test]
    fn test_round_trip_folds_vacation_split() {
        let mut wallet = LeaveWallet::new(UserId::new(), 2025);
        wallet.sheet.bucket_mut(LeaveBalanceType::VacationAp).credited = dec!(1);
        wallet.sheet.bucket_mut(LeaveBalanceType::VacationAp).carried = dec!(4);
        wallet.sheet.bucket_mut(LeaveBalanceType::VacationAc).credited = dec!(8);
        wallet.sheet.bucket_mut(LeaveBalanceType::VacationAc).carried = dec!(2);

        let columns = LeaveCounters::from_wallet(&wallet);
        let rebuilt = columns.clone().into_wallet(wallet.id, wallet.user_id, wallet.year);

        assert_eq!(LeaveCounters::from_wallet(&rebuilt), columns);
        for kind in [LeaveBalanceType::VacationAp, LeaveBalanceType::VacationAc] {
            assert_eq!(rebuilt.balance(kind), wallet.balance(kind));
        }
        assert_eq!(rebuilt.sheet.bucket(LeaveBalanceType::VacationAp).carried, dec!(5));
        assert_eq!(rebuilt.sheet.bucket(LeaveBalanceType::VacationAc).carried, Decimal::ZERO);
        assert_eq!(LeaveBalanceType::Vacation.carry_bucket(), LeaveBalanceType::VacationAp);
    }

    #[test]
    fn test_derived_availables() {
        let c = counters();
        assert_eq!(c.vacation_available_ap(), dec!(0));
        assert_eq!(c.vacation_available_ac(), dec!(7));
        assert_eq!(c.rol_available(), dec!(9.5));
        assert_eq!(c.permits_available(), dec!(6));
    }

    #[test]
    fn test_patch_diff_and_apply() {
        let before = counters();
        let mut after = before.clone();
        after.vacation_used_ac = dec!(4);
        after.ap_expiry_date = None;
        after.status = WalletStatus::Closed;

        let patch = WalletPatch::diff(&before, &after);

        assert_eq!(patch.vacation_used_ac, Some(dec!(4)));
        assert_eq!(patch.ap_expiry_date, Some(None));
        assert_eq!(patch.status, Some(WalletStatus::Closed));
        assert_eq!(patch.vacation_accrued, None);
        assert!(!patch.is_empty());
        assert_eq!(patch.apply(&before), after);
        assert!(WalletPatch::diff(&after, &after).is_empty());
    }

    #[test]
    fn test_ledger_mismatches() {
        let stored = counters();
        let mut replayed = stored.clone();
        replayed.rol_used = dec!(6);
        replayed.ap_expiry_date = None;

        let mismatches = stored.ledger_mismatches(&replayed);
        assert_eq!(mismatches, vec![("rol_used", dec!(6.5), dec!(6))]);
    }

    #[test]
    fn test_snapshot_from_book() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let mut book = LeaveBook::open(UserId::new(), 2025);
        book.post(
            TransactionRequest::new(TransactionType::Accrual, LeaveBalanceType::Vacation, dec!(4.5)),
            now,
        )
        .unwrap();
        book.reserve(
            crate::reservation::ReserveRequest {
                reference_id: "lr-1".into(),
                balance_type: LeaveBalanceType::Vacation,
                amount: dec!(1.5),
                expires_at: now + chrono::Duration::days(1),
            },
            now,
        )
        .unwrap();

        let snapshot = WalletSnapshot::from_book(&book, now);

        assert_eq!(snapshot.counters.vacation_accrued, dec!(4.5));
        assert_eq!(snapshot.vacation_available, dec!(4.5));
        assert_eq!(snapshot.reserved[&LeaveBalanceType::Vacation], dec!(1.5));
        assert_eq!(book.entries()[0].entry_type, LedgerEntryType::Accrual);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["vacation_accrued"], "4.5");
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["reserved"]["vacation"], "1.5");
    }

    #[test]
    fn test_snapshot_hides_expired_prior_year_days() {
        let march = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let mut book = LeaveBook::open(UserId::new(), 2025);
        book.post(
            TransactionRequest::new(TransactionType::CarryOver, LeaveBalanceType::Vacation, dec!(5))
                .with_expiry(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()),
            march,
        )
        .unwrap();
        book.post(
            TransactionRequest::new(TransactionType::Accrual, LeaveBalanceType::Vacation, dec!(2)),
            march,
        )
        .unwrap();

        let before = WalletSnapshot::from_book(&book, march);
        assert_eq!(before.vacation_available_ap, dec!(5));
        assert_eq!(before.vacation_available, dec!(7));

        let after = WalletSnapshot::from_book(&book, Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap());
        assert_eq!(after.counters.vacation_previous_year, dec!(5));
        assert_eq!(after.vacation_available_ap, dec!(0));
        assert_eq!(after.vacation_available, dec!(2));
    }
}
