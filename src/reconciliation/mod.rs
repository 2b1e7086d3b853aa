//! Reconciliation and comparison of calculation batches.
//!
//! Compares two batches at progressively finer granularity — aggregate
//! totals, segment subtotals, per-entity totals, then per-component payouts
//! for the entities that disagree. Mismatches are report output, never
//! errors. Every comparison includes a false-green check: an aggregate that
//! matches within tolerance while large per-entity deltas cancel each other
//! out is flagged, not passed.
//!
//! Reports are deterministic: joins run over `BTreeMap`s keyed by identity,
//! discrepancy lists are sorted, and the report itself carries no generated
//! identifiers. Comparing the same pair of batches twice yields
//! byte-identical serialized reports.

mod engine;
mod report;

pub use engine::ReconciliationEngine;
pub use report::{
    AggregateComparison, ComparisonDepth, ComparisonReport, Discrepancy, DiscrepancyKind,
    ReconciliationSession,
};
