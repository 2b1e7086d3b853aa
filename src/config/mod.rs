//! Configuration for the payout engine.
//!
//! This module provides the [`PlanLoader`] type for loading and validating
//! rule set (plan) documents, and the [`EngineSettings`] surface supplying
//! reconciliation tolerances, the false-green threshold, the concurrency
//! limit and the segment grouping key.

mod loader;
mod types;

pub use loader::PlanLoader;
pub use types::{EngineSettings, Tolerance};
