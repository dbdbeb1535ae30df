//! Reservation repository.

use saldo_core::ledger::LeaveReservation;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use super::error::RepositoryError;
use crate::convert;
use crate::entities::balance_reservations;

/// Repository for balance reservations.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    db: DatabaseConnection,
}

impl ReservationRepository {
    /// Creates a new reservation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The most recent reservation of a leave request, in any status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn latest(&self, reference_id: &str) -> Result<Option<LeaveReservation>, RepositoryError> {
        let model = balance_reservations::Entity::find()
            .filter(balance_reservations::Column::LeaveRequestId.eq(reference_id))
            .order_by_desc(balance_reservations::Column::CreatedAt)
            .order_by_desc(balance_reservations::Column::Id)
            .one(&self.db)
            .await?;

        Ok(model.as_ref().map(convert::reservation).transpose()?)
    }
}
