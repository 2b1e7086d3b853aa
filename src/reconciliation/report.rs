//! Comparison report types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ComponentTrace;

/// How deep a comparison descended.
///
/// The ladder is `NotStarted → Aggregate → Segment → Entity → Component`;
/// a comparison only advances as far as both sides' data support. The
/// segment layer is skipped (without capping the descent) when no segment
/// key is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonDepth {
    /// Nothing compared yet.
    NotStarted,
    /// Aggregate totals compared.
    Aggregate,
    /// Segment subtotals compared.
    Segment,
    /// Per-entity totals joined and compared.
    Entity,
    /// Per-component payouts compared for flagged entities.
    Component,
}

/// What kind of mismatch a discrepancy records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// A segment subtotal differs beyond tolerance.
    SegmentDiscrepancy,
    /// The entity is present on the left side only.
    MissingEntity,
    /// The entity is present on the right side only.
    ExtraEntity,
    /// Both sides paid the entity, but the totals differ beyond tolerance.
    EntityDiscrepancy,
    /// A component payout differs between the two sides.
    ComponentDiscrepancy,
}

/// One mismatch found during comparison.
///
/// `expected` is the left side's value and `actual` the right side's;
/// `delta = actual - expected`. A side that lacks the identity entirely
/// contributes zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// The layer at which the mismatch was found.
    pub level: ComparisonDepth,
    /// The kind of mismatch.
    pub kind: DiscrepancyKind,
    /// The identity the mismatch is attached to: a segment value, an entity
    /// id, or `entity_id/component_name` at component level.
    pub identity: String,
    /// The left side's value.
    pub expected: Decimal,
    /// The right side's value.
    pub actual: Decimal,
    /// `actual - expected`.
    pub delta: Decimal,
    /// The delta as a percentage of `expected`; `None` when `expected` is
    /// zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_pct: Option<Decimal>,
    /// The left side's calculation trace, attached at component level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_trace: Option<ComponentTrace>,
    /// The right side's calculation trace, attached at component level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_trace: Option<ComponentTrace>,
}

/// The aggregate-level comparison of two batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateComparison {
    /// The left batch's total payout across `Ok` results.
    pub left_total: Decimal,
    /// The right batch's total payout across `Ok` results.
    pub right_total: Decimal,
    /// `right_total - left_total`.
    pub delta: Decimal,
    /// The delta as a percentage of the left total; `None` when the left
    /// total is zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_pct: Option<Decimal>,
    /// Whether the aggregate delta is within the configured tolerance.
    pub within_tolerance: bool,
}

/// The complete, deterministic output of one comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// The aggregate-level comparison.
    pub aggregate: AggregateComparison,
    /// True when the aggregate matched within tolerance but offsetting
    /// per-entity deltas exceeded the false-green threshold. A green
    /// aggregate with this flag set must not be treated as a pass.
    pub false_green: bool,
    /// The sum of absolute per-entity deltas, the quantity the false-green
    /// check compares against its threshold.
    pub abs_entity_delta_sum: Decimal,
    /// The deepest layer the comparison examined.
    pub depth_reached: ComparisonDepth,
    /// The entity attribute segment subtotals were grouped by, when
    /// configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_key: Option<String>,
    /// All mismatches found, sorted by (level, identity, kind).
    pub discrepancies: Vec<Discrepancy>,
}

impl ComparisonReport {
    /// True when the aggregate matched within tolerance and no false-green
    /// was detected. Finer-grained discrepancies may still exist; callers
    /// deciding pass/fail at a deeper level should inspect
    /// [`discrepancies`](Self::discrepancies).
    pub fn aggregate_green(&self) -> bool {
        self.aggregate.within_tolerance && !self.false_green
    }
}

/// One recorded reconciliation run over two named batches.
///
/// The session owns the generated identifier so the report itself stays
/// deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSession {
    /// Unique identifier for this run.
    pub session_id: Uuid,
    /// The left (expected-side) batch.
    pub left_batch_id: Uuid,
    /// The right (actual-side) batch.
    pub right_batch_id: Uuid,
    /// The comparison output.
    pub report: ComparisonReport,
}
