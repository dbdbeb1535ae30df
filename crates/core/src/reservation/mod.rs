//! Balance reservations.
//!
//! A reservation is a virtual hold against `available()`. It never touches the
//! wallet counters; confirming it posts the paired usage. The state machine is
//! `PENDING -> {CONFIRMED, CANCELLED, EXPIRED}` and each reservation leaves
//! `PENDING` exactly once.

pub mod types;

pub use types::{
    CancelOutcome, ConfirmOutcome, Reservation, ReservationStatus, ReservationTransition,
    ReserveOutcome, ReserveRequest,
};
