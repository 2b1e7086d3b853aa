//! Calculation batch and result models.
//!
//! A batch is one immutable execution of the batch runner against
//! (tenant, rule set, period). It owns one [`CalculationResult`] per entity,
//! keyed by entity id so the result set is independent of scheduling order,
//! plus a manifest of per-entity outcomes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{ComponentType, MetricFact, MetricMap};
use crate::calculation::round_payout;

/// The per-entity outcome recorded in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOutcome {
    /// The entity was calculated successfully.
    Ok,
    /// No variant's eligibility predicate matched; the entity is excluded,
    /// not zero-paid. This is an explicit outcome, not an error.
    NoMatch,
    /// An entity-scoped failure occurred; see `failure_reason`.
    Failed,
}

/// The explainability trace attached to one component result.
///
/// Captures the calculation's input, its output, and a human-readable
/// explanation of the decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentTrace {
    /// The input data for the calculation.
    pub input: serde_json::Value,
    /// The output data from the calculation.
    pub output: serde_json::Value,
    /// Human-readable explanation of how the payout was produced.
    pub reasoning: String,
}

/// The payout and trace for one component of one entity's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResult {
    /// The component name from the plan.
    pub component_name: String,
    /// The component's shape tag.
    pub component_type: ComponentType,
    /// The rounded payout for this component.
    pub payout: Decimal,
    /// The explainability trace.
    pub trace: ComponentTrace,
}

/// The result of calculating one entity against a rule set for a period.
///
/// Invariant: for `Ok` results, `total_payout` equals the rounded sum of the
/// component payouts exactly; any divergence is a defect, not rounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    /// The entity this result belongs to.
    pub entity_id: String,
    /// The rule set the result was calculated against.
    pub rule_set_id: String,
    /// The period key the result is scoped to.
    pub period_key: String,
    /// The per-entity outcome.
    pub outcome: EntityOutcome,
    /// The failure reason when `outcome` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// The selected variant name when one matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Sum of component payouts, rounded to 2 decimal places.
    pub total_payout: Decimal,
    /// Component-level breakdown in calculation order.
    pub components: Vec<ComponentResult>,
    /// The resolved metrics used, kept for explainability.
    #[serde(default)]
    pub metrics: MetricMap,
}

impl CalculationResult {
    /// Checks the total-equals-component-sum invariant.
    pub fn totals_consistent(&self) -> bool {
        let sum: Decimal = self.components.iter().map(|c| c.payout).sum();
        self.total_payout == round_payout(sum)
    }

    /// Flattens the resolved-metric snapshot into persistable
    /// [`MetricFact`]s, one per metric, in metric-name order.
    pub fn metric_facts(&self) -> Vec<MetricFact> {
        self.metrics
            .iter()
            .map(|(metric, value)| MetricFact {
                entity_id: self.entity_id.clone(),
                period_key: self.period_key.clone(),
                metric: metric.clone(),
                value: *value,
            })
            .collect()
    }
}

/// Counts of per-entity outcomes for a completed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchManifest {
    /// Entities calculated successfully.
    pub ok: usize,
    /// Entities with no eligible variant.
    pub no_match: usize,
    /// Entities that failed with an entity-scoped error.
    pub failed: usize,
    /// Failure reason per failed entity id.
    #[serde(default)]
    pub failure_reasons: BTreeMap<String, String>,
}

/// Whether the batch covered its full entity set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// All entities were processed.
    Complete,
    /// The batch was cancelled; only the completed results are present.
    Partial,
}

/// One immutable execution of the batch runner.
///
/// Re-running a calculation produces a new batch with a new id, never an
/// in-place update, so history is preserved for audit and for before/after
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationBatch {
    /// Unique identifier for this batch.
    pub batch_id: Uuid,
    /// The tenant the batch belongs to.
    pub tenant_id: String,
    /// The rule set calculated against.
    pub rule_set_id: String,
    /// The rule set version calculated against.
    pub rule_set_version: u32,
    /// The period calculated for.
    pub period_key: String,
    /// When the batch was created.
    pub created_at: DateTime<Utc>,
    /// Complete or partial (cancelled).
    pub status: BatchStatus,
    /// One result per processed entity, keyed by entity id.
    pub results: BTreeMap<String, CalculationResult>,
    /// Per-entity outcome counts.
    pub manifest: BatchManifest,
}

impl CalculationBatch {
    /// Sums `total_payout` across `Ok` results.
    ///
    /// `NoMatch` and `Failed` entities carry a zero total and are excluded
    /// by construction, but the filter is explicit so the aggregate is
    /// well-defined even for hand-built result sets.
    pub fn total_payout(&self) -> Decimal {
        self.results
            .values()
            .filter(|r| r.outcome == EntityOutcome::Ok)
            .map(|r| r.total_payout)
            .sum()
    }
}
