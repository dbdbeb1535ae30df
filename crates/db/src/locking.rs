//! Wallet-level locking.
//!
//! Every mutation of a wallet runs inside one [`WalletTransaction`]: the
//! wallet row is locked with `SELECT ... FOR UPDATE` (created first when
//! missing), its book is loaded, the pure engine runs, and the change set is
//! written back before commit.
//!
//! # Usage
//!
//! ```ignore
//! use saldo_db::locking::WalletTransaction;
//!
//! let txn = WalletTransaction::begin(&db).await?;
//! let mut locked = txn.lock(user_id, 2025, now).await?;
//! locked.book.post(request, now)?;
//! txn.save(&mut locked, now).await?;
//! txn.commit().await?;
//! ```

use chrono::{DateTime, Utc};
use saldo_core::balance::LeaveBalanceType;
use saldo_core::ledger::{BookChanges, LeaveBook, LeaveCounters, WalletError, WalletPatch};
use saldo_shared::types::{UserId, WalletId};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, NotSet, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::convert;
use crate::entities::{
    balance_reservations, sea_orm_active_enums as db_enums, wallet_ledger_entries, wallets,
};
use crate::repositories::RepositoryError;

/// A wallet book loaded under its row lock.
#[derive(Debug)]
pub struct LockedWallet {
    /// The book to run operations on.
    pub book: LeaveBook,
    before: LeaveCounters,
}

impl LockedWallet {
    /// Columns of the wallet row as they were when locked.
    #[must_use]
    pub const fn before(&self) -> &LeaveCounters {
        &self.before
    }

    /// Patch turning the locked row into the book's current wallet.
    #[must_use]
    pub fn patch(&self) -> WalletPatch {
        WalletPatch::diff(&self.before, &LeaveCounters::from_wallet(self.book.wallet()))
    }
}

/// A database transaction holding wallet row locks.
pub struct WalletTransaction {
    txn: DatabaseTransaction,
}

impl WalletTransaction {
    /// Begins a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    pub async fn begin(db: &DatabaseConnection) -> Result<Self, DbErr> {
        Ok(Self { txn: db.begin().await? })
    }

    /// Returns a reference to the underlying transaction.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Locks the wallet of `(user_id, year)`, creating it when missing, and
    /// loads its ledger lines and reservations.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a stored row cannot be decoded.
    pub async fn lock(
        &self,
        user_id: UserId,
        year: i32,
        now: DateTime<Utc>,
    ) -> Result<LockedWallet, RepositoryError> {
        ensure_wallet(&self.txn, user_id, year, now).await?;

        let model = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id.into_inner()))
            .filter(wallets::Column::Year.eq(year))
            .lock_exclusive()
            .one(&self.txn)
            .await?
            .ok_or(WalletError::WalletNotFound {
                user_id: user_id.into_inner(),
                year,
            })?;

        let book = load_book_of(&self.txn, &model).await?;
        Ok(LockedWallet {
            before: convert::counters(&model),
            book,
        })
    }

    /// Writes the book's pending changes and the wallet patch.
    ///
    /// Returns the change set that was written.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] when a concurrent writer created a
    /// pending reservation for the same reference, or a database error.
    pub async fn save(
        &self,
        locked: &mut LockedWallet,
        now: DateTime<Utc>,
    ) -> Result<BookChanges<LeaveBalanceType>, RepositoryError> {
        let changes = locked.book.take_changes();
        let wallet_id = locked.book.wallet().id;

        if !changes.entries.is_empty() {
            wallet_ledger_entries::Entity::insert_many(changes.entries.iter().map(convert::entry_model))
                .exec_without_returning(&self.txn)
                .await?;
        }

        for draw in &changes.draws {
            wallet_ledger_entries::Entity::update_many()
                .col_expr(
                    wallet_ledger_entries::Column::RemainingAmount,
                    Expr::value(draw.remaining_after),
                )
                .filter(wallet_ledger_entries::Column::Id.eq(draw.entry_id.into_inner()))
                .exec(&self.txn)
                .await?;
        }

        if !changes.reservations.is_empty() {
            balance_reservations::Entity::insert_many(
                changes.reservations.iter().map(convert::reservation_model),
            )
            .exec_without_returning(&self.txn)
            .await?;
        }

        for transition in &changes.transitions {
            balance_reservations::ActiveModel {
                id: Unchanged(transition.reservation_id.into_inner()),
                status: Set(convert::db_reservation_status(transition.to)),
                resolved_at: Set(Some(transition.at.into())),
                posting_id: transition
                    .posting_id
                    .map_or(NotSet, |posting_id| Set(Some(posting_id.into_inner()))),
                ..Default::default()
            }
            .update(&self.txn)
            .await?;
        }

        let patch = locked.patch();
        if !patch.is_empty() {
            convert::patch_model(wallet_id, &patch, now).update(&self.txn).await?;
            locked.before = patch.apply(&locked.before);
        }

        Ok(changes)
    }

    /// Commits the transaction, persisting all changes and releasing the locks.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction, discarding all changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Inserts a zeroed wallet for `(user_id, year)` unless one exists.
///
/// # Errors
///
/// Returns an error if the insert fails for another reason than the unique key.
pub async fn ensure_wallet<C: ConnectionTrait>(
    db: &C,
    user_id: UserId,
    year: i32,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    let zero = rust_decimal::Decimal::ZERO;
    let model = wallets::ActiveModel {
        id: Set(WalletId::new().into_inner()),
        user_id: Set(user_id.into_inner()),
        year: Set(year),
        vacation_previous_year: Set(zero),
        vacation_current_year: Set(zero),
        vacation_accrued: Set(zero),
        vacation_used_ap: Set(zero),
        vacation_used_ac: Set(zero),
        rol_previous_year: Set(zero),
        rol_accrued: Set(zero),
        rol_used: Set(zero),
        permits_total: Set(zero),
        permits_used: Set(zero),
        ap_expiry_date: Set(None),
        status: Set(db_enums::WalletStatus::Active),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    wallets::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([wallets::Column::UserId, wallets::Column::Year])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Loads the ledger lines and reservations of a wallet row.
///
/// # Errors
///
/// Returns an error if a query fails or a stored row cannot be decoded.
pub async fn load_book_of<C: ConnectionTrait>(
    db: &C,
    model: &wallets::Model,
) -> Result<LeaveBook, RepositoryError> {
    let entries = wallet_ledger_entries::Entity::find()
        .filter(wallet_ledger_entries::Column::WalletId.eq(model.id))
        .order_by_asc(wallet_ledger_entries::Column::CreatedAt)
        .order_by_asc(wallet_ledger_entries::Column::Id)
        .all(db)
        .await?
        .iter()
        .map(convert::entry)
        .collect::<Result<Vec<_>, _>>()?;

    let reservations = balance_reservations::Entity::find()
        .filter(balance_reservations::Column::WalletId.eq(model.id))
        .order_by_asc(balance_reservations::Column::CreatedAt)
        .order_by_asc(balance_reservations::Column::Id)
        .all(db)
        .await?
        .iter()
        .map(convert::reservation)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LeaveBook::new(convert::wallet(model), entries, reservations))
}

/// Distinct users owning a wallet for `year`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn wallet_users<C: ConnectionTrait>(db: &C, year: i32) -> Result<Vec<UserId>, DbErr> {
    let users: Vec<Uuid> = wallets::Entity::find()
        .select_only()
        .column(wallets::Column::UserId)
        .filter(wallets::Column::Year.eq(year))
        .order_by_asc(wallets::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(users.into_iter().map(UserId::from_uuid).collect())
}

/// `(user, year)` keys of every wallet, optionally restricted to one year.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn wallet_keys<C: ConnectionTrait>(
    db: &C,
    year: Option<i32>,
) -> Result<Vec<(UserId, i32)>, DbErr> {
    let mut query = wallets::Entity::find()
        .select_only()
        .column(wallets::Column::UserId)
        .column(wallets::Column::Year);
    if let Some(year) = year {
        query = query.filter(wallets::Column::Year.eq(year));
    }
    let keys: Vec<(Uuid, i32)> = query
        .order_by_asc(wallets::Column::Year)
        .order_by_asc(wallets::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(keys
        .into_iter()
        .map(|(user_id, year)| (UserId::from_uuid(user_id), year))
        .collect())
}
