//! The comparison engine.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{EngineSettings, Tolerance};
use crate::models::{CalculationBatch, CalculationResult, Entity, EntityOutcome};

use super::report::{
    AggregateComparison, ComparisonDepth, ComparisonReport, Discrepancy, DiscrepancyKind,
    ReconciliationSession,
};

/// Segment bucket for entities lacking the configured attribute.
const UNSEGMENTED: &str = "(none)";

/// Compares two calculation batches and produces a [`ComparisonReport`].
///
/// The engine is infallible over its inputs: mismatched data produces report
/// output, never an error. Only `Ok`-outcome results participate —
/// `NoMatch` and `Failed` entities pay nothing, so a side that failed an
/// entity simply does not have it.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    settings: EngineSettings,
}

impl ReconciliationEngine {
    /// Creates an engine with the given settings.
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Compares `left` (the expected side) against `right` (the actual
    /// side), descending the depth ladder as far as the data supports.
    ///
    /// `entities` supplies the attributes used for segment grouping; ids
    /// absent from it fall into an unsegmented bucket.
    pub fn compare(
        &self,
        left: &CalculationBatch,
        right: &CalculationBatch,
        entities: &[Entity],
    ) -> ReconciliationSession {
        let session_id = Uuid::new_v4();
        info!(
            session_id = %session_id,
            left = %left.batch_id,
            right = %right.batch_id,
            "starting reconciliation"
        );

        let left_paid = paid_totals(left);
        let right_paid = paid_totals(right);

        // L0: aggregate totals.
        let left_total: Decimal = left_paid.values().copied().sum();
        let right_total: Decimal = right_paid.values().copied().sum();
        let aggregate = AggregateComparison {
            left_total,
            right_total,
            delta: right_total - left_total,
            delta_pct: Tolerance::delta_pct(left_total, right_total),
            within_tolerance: self.settings.tolerance.within(left_total, right_total),
        };
        let mut depth = ComparisonDepth::Aggregate;
        let mut discrepancies = Vec::new();

        // Identity-keyed union of paid entities; both maps are BTreeMaps so
        // iteration and the resulting report are deterministic.
        let entity_ids: Vec<&String> = {
            let mut ids: Vec<&String> =
                left_paid.keys().chain(right_paid.keys()).copied().collect();
            ids.sort();
            ids.dedup();
            ids
        };

        // Mandatory false-green check: offsetting per-entity deltas must not
        // hide behind a matching aggregate.
        let abs_entity_delta_sum: Decimal = entity_ids
            .iter()
            .map(|id| {
                let l = left_paid.get(*id).copied().unwrap_or(Decimal::ZERO);
                let r = right_paid.get(*id).copied().unwrap_or(Decimal::ZERO);
                (r - l).abs()
            })
            .sum();
        let false_green = aggregate.within_tolerance
            && !entity_ids.is_empty()
            && abs_entity_delta_sum > self.settings.false_green_threshold;

        // L1: segment subtotals, grouped by the configured entity attribute.
        // Skipped, without capping the descent, when no key is configured.
        if let Some(key) = &self.settings.segment_key {
            depth = ComparisonDepth::Segment;
            let segment_of: BTreeMap<&str, &str> = entities
                .iter()
                .map(|e| (e.id.as_str(), e.attribute(key).unwrap_or(UNSEGMENTED)))
                .collect();
            let mut segments: BTreeMap<&str, (Decimal, Decimal)> = BTreeMap::new();
            for id in &entity_ids {
                let segment = segment_of.get(id.as_str()).copied().unwrap_or(UNSEGMENTED);
                let entry = segments.entry(segment).or_default();
                entry.0 += left_paid.get(*id).copied().unwrap_or(Decimal::ZERO);
                entry.1 += right_paid.get(*id).copied().unwrap_or(Decimal::ZERO);
            }
            for (segment, (l, r)) in segments {
                if !self.settings.tolerance.within(l, r) {
                    discrepancies.push(discrepancy(
                        ComparisonDepth::Segment,
                        DiscrepancyKind::SegmentDiscrepancy,
                        segment.to_string(),
                        l,
                        r,
                    ));
                }
            }
        }

        // L2: per-entity join. Only flagged entities descend further.
        let mut flagged: Vec<&String> = Vec::new();
        if !entity_ids.is_empty() {
            depth = ComparisonDepth::Entity;
            for id in &entity_ids {
                match (left_paid.get(*id), right_paid.get(*id)) {
                    (Some(&l), None) => discrepancies.push(discrepancy(
                        ComparisonDepth::Entity,
                        DiscrepancyKind::MissingEntity,
                        (*id).clone(),
                        l,
                        Decimal::ZERO,
                    )),
                    (None, Some(&r)) => discrepancies.push(discrepancy(
                        ComparisonDepth::Entity,
                        DiscrepancyKind::ExtraEntity,
                        (*id).clone(),
                        Decimal::ZERO,
                        r,
                    )),
                    (Some(&l), Some(&r)) => {
                        if !self.settings.tolerance.within(l, r) {
                            discrepancies.push(discrepancy(
                                ComparisonDepth::Entity,
                                DiscrepancyKind::EntityDiscrepancy,
                                (*id).clone(),
                                l,
                                r,
                            ));
                            flagged.push(id);
                        }
                    }
                    (None, None) => {}
                }
            }
        }

        // L3: per-component join for the entities that disagree, with both
        // sides' traces attached for drill-down.
        if !flagged.is_empty() {
            depth = ComparisonDepth::Component;
            for id in flagged {
                let left_components = components_of(left.results.get(id));
                let right_components = components_of(right.results.get(id));
                let mut names: Vec<&String> = left_components
                    .keys()
                    .chain(right_components.keys())
                    .copied()
                    .collect();
                names.sort();
                names.dedup();
                for name in names {
                    let l = left_components.get(name);
                    let r = right_components.get(name);
                    let l_payout = l.map_or(Decimal::ZERO, |c| c.payout);
                    let r_payout = r.map_or(Decimal::ZERO, |c| c.payout);
                    if !self.settings.tolerance.within(l_payout, r_payout) {
                        let mut item = discrepancy(
                            ComparisonDepth::Component,
                            DiscrepancyKind::ComponentDiscrepancy,
                            format!("{id}/{name}"),
                            l_payout,
                            r_payout,
                        );
                        item.left_trace = l.map(|c| c.trace.clone());
                        item.right_trace = r.map(|c| c.trace.clone());
                        discrepancies.push(item);
                    }
                }
            }
        }

        discrepancies.sort_by(|a, b| {
            (a.level, &a.identity, a.kind).cmp(&(b.level, &b.identity, b.kind))
        });
        for item in &discrepancies {
            debug!(
                kind = ?item.kind,
                identity = %item.identity,
                delta = %item.delta,
                "discrepancy"
            );
        }
        info!(
            session_id = %session_id,
            within_tolerance = aggregate.within_tolerance,
            false_green,
            discrepancies = discrepancies.len(),
            depth = ?depth,
            "reconciliation finished"
        );

        ReconciliationSession {
            session_id,
            left_batch_id: left.batch_id,
            right_batch_id: right.batch_id,
            report: ComparisonReport {
                aggregate,
                false_green,
                abs_entity_delta_sum,
                depth_reached: depth,
                segment_key: self.settings.segment_key.clone(),
                discrepancies,
            },
        }
    }
}

/// Paid total per entity across a batch's `Ok` results.
fn paid_totals(batch: &CalculationBatch) -> BTreeMap<&String, Decimal> {
    batch
        .results
        .iter()
        .filter(|(_, r)| r.outcome == EntityOutcome::Ok)
        .map(|(id, r)| (id, r.total_payout))
        .collect()
}

/// Component results keyed by name for one entity's result, if present.
fn components_of(
    result: Option<&CalculationResult>,
) -> BTreeMap<&String, &crate::models::ComponentResult> {
    result
        .map(|r| {
            r.components
                .iter()
                .map(|c| (&c.component_name, c))
                .collect()
        })
        .unwrap_or_default()
}

fn discrepancy(
    level: ComparisonDepth,
    kind: DiscrepancyKind,
    identity: String,
    expected: Decimal,
    actual: Decimal,
) -> Discrepancy {
    Discrepancy {
        level,
        kind,
        identity,
        expected,
        actual,
        delta: actual - expected,
        delta_pct: Tolerance::delta_pct(expected, actual),
        left_trace: None,
        right_trace: None,
    }
}
