//! Wallet repository: locked mutations and lock-free reads of leave wallets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use saldo_core::balance::LeaveBalanceType;
use saldo_core::ledger::{
    LeaveBook, LeaveEntry, LeaveWallet, Posting, PostingOutcome, ReferenceType,
    TransactionRequest, TransactionType, WalletError, WalletSnapshot, active_usage,
};
use saldo_core::reservation::{CancelOutcome, ConfirmOutcome, ReserveOutcome, ReserveRequest};
use saldo_shared::types::{UserId, WalletId};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::{debug, info, warn};

use super::error::RepositoryError;
use super::ledger::LedgerRepository;
use super::reservation::ReservationRepository;
use crate::entities::wallets;
use crate::locking::{self, WalletTransaction};

/// Leave posting result.
pub type LeaveOutcome = PostingOutcome<LeaveBalanceType>;

/// Repository for leave wallets.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    db: DatabaseConnection,
}

impl WalletRepository {
    /// Creates a new wallet repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    // ========== Reads ==========

    /// Returns the wallet of `(user_id, year)`, creating a zeroed one when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn get_or_create(
        &self,
        user_id: UserId,
        year: i32,
        now: DateTime<Utc>,
    ) -> Result<LeaveWallet, RepositoryError> {
        locking::ensure_wallet(&self.db, user_id, year, now).await?;
        let model = self
            .find_model(user_id, year)
            .await?
            .ok_or(WalletError::WalletNotFound {
                user_id: user_id.into_inner(),
                year,
            })?;
        Ok(crate::convert::wallet(&model))
    }

    /// Loads the book of `(user_id, year)` without locking.
    ///
    /// A missing wallet yields a zeroed book; nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn load_book(&self, user_id: UserId, year: i32) -> Result<LeaveBook, RepositoryError> {
        match self.find_model(user_id, year).await? {
            Some(model) => locking::load_book_of(&self.db, &model).await,
            None => Ok(LeaveBook::open(user_id, year)),
        }
    }

    /// Every counter of a wallet plus derived availables.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn snapshot(
        &self,
        user_id: UserId,
        year: i32,
        now: DateTime<Utc>,
    ) -> Result<WalletSnapshot, RepositoryError> {
        let book = self.load_book(user_id, year).await?;
        Ok(WalletSnapshot::from_book(&book, now))
    }

    /// Balance of `kind` minus active reservations.
    ///
    /// Lock-free; `confirm` re-validates under the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn available(
        &self,
        user_id: UserId,
        year: i32,
        kind: LeaveBalanceType,
        now: DateTime<Utc>,
    ) -> Result<Decimal, RepositoryError> {
        let book = self.load_book(user_id, year).await?;
        Ok(book.available(kind, now))
    }

    /// Users owning a wallet for `year`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn users_for_year(&self, year: i32) -> Result<Vec<UserId>, RepositoryError> {
        Ok(locking::wallet_users(&self.db, year).await?)
    }

    /// `(user, year)` keys of every wallet, optionally for one year only.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn wallet_keys(&self, year: Option<i32>) -> Result<Vec<(UserId, i32)>, RepositoryError> {
        Ok(locking::wallet_keys(&self.db, year).await?)
    }

    async fn find_model(
        &self,
        user_id: UserId,
        year: i32,
    ) -> Result<Option<wallets::Model>, RepositoryError> {
        Ok(wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id.into_inner()))
            .filter(wallets::Column::Year.eq(year))
            .one(&self.db)
            .await?)
    }

    // ========== Locked mutations ==========

    /// Runs `op` on the locked book of `(user_id, year)` and persists its changes.
    ///
    /// Pending reservations past their expiry are expired first. When `op`
    /// fails nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the error of `op`, or a database error.
    pub async fn with_book<T, F>(
        &self,
        user_id: UserId,
        year: i32,
        now: DateTime<Utc>,
        op: F,
    ) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut LeaveBook) -> Result<T, WalletError> + Send,
        T: Send,
    {
        let txn = WalletTransaction::begin(&self.db).await?;
        let mut locked = txn.lock(user_id, year, now).await?;
        locked.book.expire_reservations(now);

        let value = match op(&mut locked.book) {
            Ok(value) => value,
            Err(err) => {
                txn.rollback().await?;
                return Err(err.into());
            }
        };

        txn.save(&mut locked, now).await?;
        txn.commit().await?;
        Ok(value)
    }

    /// Runs `op` on the locked books of `from_year` and the following year.
    ///
    /// Locks are taken in ascending year order.
    ///
    /// # Errors
    ///
    /// Returns the error of `op`, or a database error.
    pub async fn with_year_pair<T, F>(
        &self,
        user_id: UserId,
        from_year: i32,
        now: DateTime<Utc>,
        op: F,
    ) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut LeaveBook, &mut LeaveBook) -> Result<T, WalletError> + Send,
        T: Send,
    {
        let txn = WalletTransaction::begin(&self.db).await?;
        let mut source = txn.lock(user_id, from_year, now).await?;
        let mut target = txn.lock(user_id, from_year + 1, now).await?;
        source.book.expire_reservations(now);
        target.book.expire_reservations(now);

        let value = match op(&mut source.book, &mut target.book) {
            Ok(value) => value,
            Err(err) => {
                txn.rollback().await?;
                return Err(err.into());
            }
        };

        txn.save(&mut source, now).await?;
        txn.save(&mut target, now).await?;
        txn.commit().await?;
        Ok(value)
    }

    /// Posts a transaction onto the wallet of `(user_id, year)`.
    ///
    /// A deduction whose leave request already has an unreversed usage in
    /// another year's wallet of the same user is reported as a duplicate of
    /// that usage.
    ///
    /// # Errors
    ///
    /// Returns a validation or business-rule error before anything is written,
    /// or a database error.
    pub async fn post(
        &self,
        user_id: UserId,
        year: i32,
        request: TransactionRequest<LeaveBalanceType>,
        now: DateTime<Utc>,
    ) -> Result<LeaveOutcome, RepositoryError> {
        if let Some(existing) = self.usage_in_other_year(user_id, year, &request).await? {
            let outcome = PostingOutcome::Duplicate(existing);
            log_outcome(user_id, year, &outcome);
            return Ok(outcome);
        }

        let outcome = self
            .with_book(user_id, year, now, |book| book.post(request, now))
            .await?;
        log_outcome(user_id, year, &outcome);
        Ok(outcome)
    }

    /// Holds balance for a leave request.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` when the hold does not fit, or
    /// [`RepositoryError::Conflict`] when another wallet already holds a
    /// pending reservation for the reference.
    pub async fn reserve(
        &self,
        user_id: UserId,
        year: i32,
        request: ReserveRequest<LeaveBalanceType>,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome<LeaveBalanceType>, RepositoryError> {
        let outcome = self
            .with_book(user_id, year, now, |book| book.reserve(request, now))
            .await?;
        let reservation = outcome.reservation();
        info!(
            user_id = %user_id,
            year,
            reference_id = %reservation.leave_request_id,
            amount = %reservation.amount,
            created = outcome.is_created(),
            "Reservation held"
        );
        Ok(outcome)
    }

    /// Confirms the pending reservation of a reference and posts its usage.
    ///
    /// A reference without any reservation is a logged no-op.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` when the balance no longer covers the
    /// reservation, or a database error.
    pub async fn confirm(
        &self,
        reference_id: &str,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<ConfirmOutcome<LeaveBalanceType>, RepositoryError> {
        let reservations = ReservationRepository::new(self.db.clone());
        let Some(latest) = reservations.latest(reference_id).await? else {
            info!(reference_id, "Confirm without reservation, nothing to do");
            return Ok(ConfirmOutcome::NoReservation);
        };

        let outcome = self
            .with_book(latest.user_id, latest.year, now, |book| {
                book.confirm(reference_id, actor, now)
            })
            .await?;

        match &outcome {
            ConfirmOutcome::Confirmed { reservation, posting } => {
                info!(
                    user_id = %reservation.user_id,
                    reference_id,
                    posting_id = ?reservation.posting_id,
                    posted = posting.is_some(),
                    "Reservation confirmed"
                );
                if let Some(posting) = posting {
                    for warning in &posting.warnings {
                        warn!(user_id = %reservation.user_id, reference_id, %warning, "Deduction not covered by buckets");
                    }
                }
            }
            ConfirmOutcome::AlreadyResolved(reservation) => {
                info!(reference_id, status = %reservation.status.as_str(), "Reservation already resolved, nothing to do");
            }
            ConfirmOutcome::NoReservation => {
                info!(reference_id, "Confirm without reservation, nothing to do");
            }
        }
        Ok(outcome)
    }

    /// Releases the pending reservation of a reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn cancel(
        &self,
        reference_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome<LeaveBalanceType>, RepositoryError> {
        let reservations = ReservationRepository::new(self.db.clone());
        let Some(latest) = reservations.latest(reference_id).await? else {
            info!(reference_id, "Cancel without reservation, nothing to do");
            return Ok(CancelOutcome::NoReservation);
        };

        let outcome = self
            .with_book(latest.user_id, latest.year, now, |book| book.cancel(reference_id, now))
            .await?;
        if let CancelOutcome::Cancelled(reservation) = &outcome {
            info!(user_id = %reservation.user_id, reference_id, "Reservation cancelled");
        }
        Ok(outcome)
    }
}

impl WalletRepository {
    /// The unreversed usage of a deduction's leave request held by another
    /// year's wallet of the user.
    async fn usage_in_other_year(
        &self,
        user_id: UserId,
        year: i32,
        request: &TransactionRequest<LeaveBalanceType>,
    ) -> Result<Option<Posting<LeaveBalanceType>>, RepositoryError> {
        if request.transaction_type != TransactionType::Deduction {
            return Ok(None);
        }
        let Some(reference) = request
            .reference
            .as_ref()
            .filter(|r| r.reference_type == ReferenceType::LeaveRequest)
        else {
            return Ok(None);
        };

        let lines = LedgerRepository::new(self.db.clone())
            .reference_lines_elsewhere(user_id, year, reference)
            .await?;
        let mut by_wallet: BTreeMap<WalletId, Vec<LeaveEntry>> = BTreeMap::new();
        for line in lines {
            by_wallet.entry(line.wallet_id).or_default().push(line);
        }

        for entries in by_wallet.values() {
            if let Some(posting_id) = active_usage(entries, reference) {
                let usage_lines = entries
                    .iter()
                    .filter(|e| e.posting_id == posting_id)
                    .cloned()
                    .collect();
                return Ok(Posting::from_lines(usage_lines));
            }
        }
        Ok(None)
    }
}

fn log_outcome(user_id: UserId, year: i32, outcome: &LeaveOutcome) {
    match outcome {
        PostingOutcome::Posted(posting) => info!(
            user_id = %user_id,
            year,
            posting_id = %posting.posting_id,
            entry_type = posting.entry_type.as_str(),
            amount = %posting.total(),
            "Posted ledger transaction"
        ),
        PostingOutcome::Duplicate(posting) => info!(
            user_id = %user_id,
            year,
            posting_id = %posting.posting_id,
            "Reference already posted, nothing written"
        ),
        PostingOutcome::Noop => debug!(user_id = %user_id, year, "Nothing to post"),
    }
    for warning in outcome.warnings() {
        warn!(user_id = %user_id, year, %warning, "Deduction not covered by buckets");
    }
}
