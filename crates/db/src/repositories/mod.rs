//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod error;
pub mod ledger;
pub mod reservation;
pub mod wallet;

pub use error::RepositoryError;
pub use ledger::{LedgerRepository, MAX_PAGE_SIZE};
pub use reservation::ReservationRepository;
pub use wallet::{LeaveOutcome, WalletRepository};
