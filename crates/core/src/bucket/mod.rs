//! FIFO consumption of additive ledger entries.
//!
//! Deductions deplete the `remaining_amount` of a bucket's additive entries,
//! soonest-expiring first. A request larger than what remains yields a
//! [`Consumption`] with a non-zero shortfall instead of failing; callers
//! surface it as a posting warning.

pub mod consumer;

#[cfg(test)]
mod consumer_props;

pub use consumer::{BucketConsumer, BucketDraw, BucketEntry, Consumption};
