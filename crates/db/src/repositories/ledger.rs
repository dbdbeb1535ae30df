//! Ledger repository: read access to ledger lines for audit and reconciliation.

use saldo_core::balance::{BalanceKind, LeaveBalanceType};
use saldo_core::ledger::{LeaveEntry, Reference, ReferenceType};
use saldo_shared::types::{PageRequest, PageResponse, UserId};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use super::error::RepositoryError;
use crate::convert;
use crate::entities::{
    sea_orm_active_enums::LedgerEntryType, wallet_ledger_entries, wallets,
};

/// Largest page the ledger export serves.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Repository for ledger lines.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lists the ledger lines of a wallet in write order.
    ///
    /// A request-level balance type such as `vacation` lists the lines of
    /// every bucket it resolves to. A missing wallet yields an empty page.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list(
        &self,
        user_id: UserId,
        year: i32,
        balance_type: Option<LeaveBalanceType>,
        page: PageRequest,
    ) -> Result<PageResponse<LeaveEntry>, RepositoryError> {
        let page = page.clamped(MAX_PAGE_SIZE);

        let wallet = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id.into_inner()))
            .filter(wallets::Column::Year.eq(year))
            .one(&self.db)
            .await?;
        let Some(wallet) = wallet else {
            return Ok(PageResponse::new(Vec::new(), page.page, page.per_page, 0));
        };

        let mut query = wallet_ledger_entries::Entity::find()
            .filter(wallet_ledger_entries::Column::WalletId.eq(wallet.id));
        if let Some(kind) = balance_type {
            let codes: Vec<String> = kind.buckets().iter().map(ToString::to_string).collect();
            query = query.filter(wallet_ledger_entries::Column::BalanceType.is_in(codes));
        }

        let total = query.clone().count(&self.db).await?;

        let entries = query
            .order_by_asc(wallet_ledger_entries::Column::CreatedAt)
            .order_by_asc(wallet_ledger_entries::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?
            .iter()
            .map(convert::entry)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageResponse::new(entries, page.page, page.per_page, total))
    }

    /// Usage and reversal lines referencing leave requests, across all wallets.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn leave_request_lines(&self) -> Result<Vec<LeaveEntry>, RepositoryError> {
        let lines = wallet_ledger_entries::Entity::find()
            .filter(
                wallet_ledger_entries::Column::ReferenceType
                    .eq(ReferenceType::LeaveRequest.as_str()),
            )
            .filter(
                wallet_ledger_entries::Column::EntryType
                    .is_in([LedgerEntryType::Usage, LedgerEntryType::Reversal]),
            )
            .order_by_asc(wallet_ledger_entries::Column::CreatedAt)
            .order_by_asc(wallet_ledger_entries::Column::Id)
            .all(&self.db)
            .await?;

        Ok(lines.iter().map(convert::entry).collect::<Result<Vec<_>, _>>()?)
    }

    /// Usage and reversal lines of a reference in the user's wallets of
    /// every year but `year`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn reference_lines_elsewhere(
        &self,
        user_id: UserId,
        year: i32,
        reference: &Reference,
    ) -> Result<Vec<LeaveEntry>, RepositoryError> {
        let wallet_ids: Vec<uuid::Uuid> = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id.into_inner()))
            .filter(wallets::Column::Year.ne(year))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|wallet| wallet.id)
            .collect();
        if wallet_ids.is_empty() {
            return Ok(Vec::new());
        }

        let lines = wallet_ledger_entries::Entity::find()
            .filter(wallet_ledger_entries::Column::WalletId.is_in(wallet_ids))
            .filter(
                wallet_ledger_entries::Column::ReferenceType
                    .eq(reference.reference_type.as_str()),
            )
            .filter(wallet_ledger_entries::Column::ReferenceId.eq(reference.reference_id.as_str()))
            .filter(
                wallet_ledger_entries::Column::EntryType
                    .is_in([LedgerEntryType::Usage, LedgerEntryType::Reversal]),
            )
            .order_by_asc(wallet_ledger_entries::Column::CreatedAt)
            .order_by_asc(wallet_ledger_entries::Column::Id)
            .all(&self.db)
            .await?;

        Ok(lines.iter().map(convert::entry).collect::<Result<Vec<_>, _>>()?)
    }
}
