//! Year-end rollover.
//!
//! Unused current-year vacation and unused ROL move to the next year's wallet
//! as `CARRY_OVER` postings; carried vacation lands in the prior-year (AP)
//! bucket with a deadline. The source wallet is then closed.

pub mod planner;

pub use planner::{
    DEFAULT_CARRYOVER_MONTHS, RolloverLine, RolloverPlan, RolloverPlanner, carryover_expiry,
};
