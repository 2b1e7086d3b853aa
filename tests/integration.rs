//! End-to-end tests for the payout engine.
//!
//! This suite covers the full pipeline on realistic plans:
//! - plan loading and validation from YAML
//! - batch calculation across mixed-outcome entity populations
//! - the total-equals-component-sum invariant
//! - reconciliation of two batches, down to component drill-down
//! - false-green detection over offsetting entity deltas
//! - the append-only plan store and batch pair reads
//! - property: marginal tiered payouts are monotonic in the driving metric

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

use payout_engine::batch::{BatchRunner, CancelHandle};
use payout_engine::calculation::calculate_tiered;
use payout_engine::config::{EngineSettings, PlanLoader};
use payout_engine::error::EngineError;
use payout_engine::models::{
    BatchStatus, CalculationBatch, Entity, EntityOutcome, Period, RateKind, RawRow, RuleSet, Tier,
    TierConfig, TierMode,
};
use payout_engine::reconciliation::{ComparisonDepth, DiscrepancyKind, ReconciliationEngine};
use payout_engine::store::{BatchStore, MemoryStore, PlanStore};

// =============================================================================
// Test Helpers
// =============================================================================

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn period() -> Period {
    Period {
        key: "2026-01".to_string(),
        tenant_id: "acme".to_string(),
        start_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        end_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
    }
}

fn entity(id: &str, attrs: &[(&str, &str)]) -> Entity {
    Entity {
        id: id.to_string(),
        tenant_id: "acme".to_string(),
        attributes: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

/// A sales plan exercising every component shape: a marginal tiered
/// commission, a two-axis volume matrix, a formula kicker over the
/// commission, and a cliff flat-amount fallback for uncertified reps.
fn sales_plan_yaml(version: u32, top_rate: &str) -> String {
    format!(
        r#"
id: plan_sales
tenant_id: acme
name: Sales Incentive Plan
version: {version}
status: active
input_bindings:
  - {{ field: sales, metric: net_sales, required: true }}
  - {{ field: units, metric: units }}
  - {{ field: attach_rate, metric: attach_rate }}
variants:
  - name: certified
    ordinal: 1
    eligibility:
      attribute_equals: {{ key: certified, value: "yes" }}
    components:
      - name: commission
        ordinal: 1
        config:
          tiered:
            metric: net_sales
            mode: marginal
            tiers:
              - {{ lower: "0", rate: "0.05" }}
              - {{ lower: "1000", rate: "0.08" }}
              - {{ lower: "5000", rate: "{top_rate}" }}
      - name: volume_bonus
        ordinal: 2
        config:
          matrix:
            row_metric: units
            column_metric: attach_rate
            row_bands:
              - {{ lower: "0", upper: "100" }}
              - {{ lower: "100" }}
            column_bands:
              - {{ lower: "0", upper: "50" }}
              - {{ lower: "50" }}
            cells:
              - ["0", "50"]
              - ["100", "250"]
      - name: kicker
        ordinal: 3
        config:
          formula:
            expr:
              mul:
                - component: commission
                - const: "0.10"
  - name: standard
    ordinal: 2
    eligibility:
      metric_at_least: {{ metric: net_sales, value: "1" }}
    components:
      - name: retainer
        ordinal: 1
        config:
          tiered:
            metric: net_sales
            mode: cliff
            rate_kind: flat_amount
            tiers:
              - {{ lower: "0", rate: "50" }}
              - {{ lower: "5000", rate: "250" }}
"#
    )
}

fn load_plan(version: u32, top_rate: &str) -> RuleSet {
    PlanLoader::from_yaml("sales_plan.yaml", &sales_plan_yaml(version, top_rate))
        .unwrap()
        .into_rule_set()
}

fn sales_entities() -> Vec<Entity> {
    vec![
        entity("rep_001", &[("certified", "yes"), ("store", "north")]),
        entity("rep_002", &[("store", "north")]),
        entity("rep_003", &[("store", "south")]),
    ]
}

fn sales_rows() -> Vec<RawRow> {
    vec![
        RawRow::new(
            "rep_001",
            [("sales", "6000"), ("units", "150"), ("attach_rate", "60")],
        ),
        RawRow::new("rep_002", [("sales", "2000"), ("units", "40")]),
        RawRow::new("rep_003", [("sales", "0")]),
    ]
}

async fn run_batch(plan: &RuleSet, entities: &[Entity], rows: &[RawRow]) -> CalculationBatch {
    BatchRunner::default()
        .run(plan, &period(), entities, rows, &CancelHandle::new())
        .await
        .unwrap()
}

// =============================================================================
// INT-001: full pipeline — plan YAML to a mixed-outcome batch
// =============================================================================

#[tokio::test]
async fn test_int_001_end_to_end_batch() {
    let plan = load_plan(1, "0.10");
    let batch = run_batch(&plan, &sales_entities(), &sales_rows()).await;

    assert_eq!(batch.status, BatchStatus::Complete);
    assert_eq!(batch.manifest.ok, 2);
    assert_eq!(batch.manifest.no_match, 1);
    assert_eq!(batch.manifest.failed, 0);

    // rep_001 (certified, 6000 sales): marginal commission 470.00, matrix
    // cell (1,1) 250.00, kicker 10% of commission 47.00.
    let rep_001 = &batch.results["rep_001"];
    assert_eq!(rep_001.outcome, EntityOutcome::Ok);
    assert_eq!(rep_001.variant.as_deref(), Some("certified"));
    assert_eq!(rep_001.total_payout, dec("767.00"));
    let payouts: BTreeMap<&str, Decimal> = rep_001
        .components
        .iter()
        .map(|c| (c.component_name.as_str(), c.payout))
        .collect();
    assert_eq!(payouts["commission"], dec("470.00"));
    assert_eq!(payouts["volume_bonus"], dec("250.00"));
    assert_eq!(payouts["kicker"], dec("47.00"));

    // rep_002 (uncertified, 2000 sales): cliff flat retainer, first tier.
    let rep_002 = &batch.results["rep_002"];
    assert_eq!(rep_002.variant.as_deref(), Some("standard"));
    assert_eq!(rep_002.total_payout, dec("50.00"));

    // rep_003 (zero sales): no variant matches, excluded not zero-paid.
    let rep_003 = &batch.results["rep_003"];
    assert_eq!(rep_003.outcome, EntityOutcome::NoMatch);
    assert!(rep_003.components.is_empty());

    // The invariant holds for every successful result.
    for result in batch.results.values() {
        assert!(result.totals_consistent(), "{}", result.entity_id);
    }
    assert_eq!(batch.total_payout(), dec("817.00"));
}

// =============================================================================
// INT-002: missing required metric fails the entity, not the batch
// =============================================================================

#[tokio::test]
async fn test_int_002_missing_required_metric_isolated() {
    let plan = load_plan(1, "0.10");
    let mut entities = sales_entities();
    entities.push(entity("rep_004", &[("certified", "yes")]));
    // No rows at all for rep_004.
    let batch = run_batch(&plan, &entities, &sales_rows()).await;

    assert_eq!(batch.manifest.failed, 1);
    let rep_004 = &batch.results["rep_004"];
    assert_eq!(rep_004.outcome, EntityOutcome::Failed);
    assert!(
        rep_004
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("net_sales")
    );
    assert!(batch.manifest.failure_reasons.contains_key("rep_004"));

    // The failed entity contributes nothing to the aggregate.
    assert_eq!(batch.total_payout(), dec("817.00"));
}

// =============================================================================
// INT-003: reconciliation across a plan version change, with drill-down
// =============================================================================

#[tokio::test]
async fn test_int_003_reconcile_rate_change() {
    let entities = sales_entities();
    let rows = sales_rows();
    let before = run_batch(&load_plan(1, "0.10"), &entities, &rows).await;
    let after = run_batch(&load_plan(2, "0.12"), &entities, &rows).await;

    let engine = ReconciliationEngine::new(EngineSettings {
        segment_key: Some("store".to_string()),
        ..EngineSettings::default()
    });
    let session = engine.compare(&before, &after, &entities);
    let report = &session.report;

    // Only the certified rep crosses the changed tier: commission gains
    // (6000-5000) * 0.02 = 20.00 and the kicker 2.00.
    assert_eq!(report.aggregate.left_total, dec("817.00"));
    assert_eq!(report.aggregate.right_total, dec("839.00"));
    assert!(!report.aggregate.within_tolerance);
    assert_eq!(report.depth_reached, ComparisonDepth::Component);
    assert_eq!(report.segment_key.as_deref(), Some("store"));

    let by_identity: BTreeMap<&str, &payout_engine::reconciliation::Discrepancy> = report
        .discrepancies
        .iter()
        .map(|d| (d.identity.as_str(), d))
        .collect();

    let north = by_identity["north"];
    assert_eq!(north.kind, DiscrepancyKind::SegmentDiscrepancy);
    assert_eq!(north.delta, dec("22.00"));
    assert!(!by_identity.contains_key("south"));

    let rep = by_identity["rep_001"];
    assert_eq!(rep.kind, DiscrepancyKind::EntityDiscrepancy);
    assert_eq!(rep.delta, dec("22.00"));

    let commission = by_identity["rep_001/commission"];
    assert_eq!(commission.delta, dec("20.00"));
    assert!(commission.left_trace.is_some());
    assert!(commission.right_trace.is_some());
    assert_eq!(by_identity["rep_001/kicker"].delta, dec("2.00"));
    assert!(!by_identity.contains_key("rep_001/volume_bonus"));
}

// =============================================================================
// INT-004: offsetting restatements are caught as false-green
// =============================================================================

#[tokio::test]
async fn test_int_004_false_green_on_restated_data() {
    let yaml = r#"
id: plan_flat
tenant_id: acme
name: Flat Passthrough
version: 1
status: active
input_bindings:
  - { field: base, metric: base, required: true }
variants:
  - name: standard
    ordinal: 1
    eligibility: always
    components:
      - name: base_pay
        ordinal: 1
        config:
          formula:
            expr:
              metric: base
"#;
    let plan = PlanLoader::from_yaml("plan_flat.yaml", yaml)
        .unwrap()
        .into_rule_set();
    let entities = vec![entity("rep_a", &[]), entity("rep_b", &[])];

    let original = vec![
        RawRow::new("rep_a", [("base", "500")]),
        RawRow::new("rep_b", [("base", "500")]),
    ];
    let restated = vec![
        RawRow::new("rep_a", [("base", "600")]),
        RawRow::new("rep_b", [("base", "400")]),
    ];

    let left = run_batch(&plan, &entities, &original).await;
    let right = run_batch(&plan, &entities, &restated).await;
    let report = ReconciliationEngine::default()
        .compare(&left, &right, &entities)
        .report;

    // The aggregate is identical on both sides; the offsetting entity
    // deltas must still be surfaced.
    assert_eq!(report.aggregate.delta, Decimal::ZERO);
    assert!(report.aggregate.within_tolerance);
    assert!(report.false_green);
    assert!(!report.aggregate_green());
    assert_eq!(report.abs_entity_delta_sum, dec("200.00"));
    assert_eq!(
        report
            .discrepancies
            .iter()
            .filter(|d| d.kind == DiscrepancyKind::EntityDiscrepancy)
            .count(),
        2
    );
}

// =============================================================================
// INT-005: identical inputs reconcile clean and deterministically
// =============================================================================

#[tokio::test]
async fn test_int_005_identical_batches_reconcile_clean() {
    let plan = load_plan(1, "0.10");
    let entities = sales_entities();
    let rows = sales_rows();
    let first = run_batch(&plan, &entities, &rows).await;
    let second = run_batch(&plan, &entities, &rows).await;

    // Distinct batch ids, identical payloads.
    assert_ne!(first.batch_id, second.batch_id);
    assert_eq!(first.results, second.results);

    let engine = ReconciliationEngine::default();
    let report = engine.compare(&first, &second, &entities).report;
    assert!(report.aggregate_green());
    assert!(report.discrepancies.is_empty());

    let rerun = engine.compare(&first, &second, &entities).report;
    assert_eq!(
        serde_json::to_string(&report).unwrap(),
        serde_json::to_string(&rerun).unwrap()
    );
}

// =============================================================================
// INT-006: plan store is append-only; batch store serves reconciliation pairs
// =============================================================================

#[tokio::test]
async fn test_int_006_stores_back_the_pipeline() {
    let mut store = MemoryStore::new();
    store.put_rule_set(load_plan(1, "0.10")).unwrap();
    store.put_rule_set(load_plan(2, "0.12")).unwrap();

    // Publishing the same version again is rejected.
    let err = store.put_rule_set(load_plan(2, "0.15")).unwrap_err();
    assert!(matches!(err, EngineError::RuleSetImmutable { .. }));

    let entities = sales_entities();
    let rows = sales_rows();
    let left = run_batch(store.rule_set("plan_sales", 1).unwrap(), &entities, &rows).await;
    let right = run_batch(store.latest_rule_set("plan_sales").unwrap(), &entities, &rows).await;
    let (left_id, right_id) = (left.batch_id, right.batch_id);
    store.put_batch(left);
    store.put_batch(right);

    let (left, right) = store.batch_pair(left_id, right_id).unwrap();
    assert_eq!(left.rule_set_version, 1);
    assert_eq!(right.rule_set_version, 2);

    let session = ReconciliationEngine::default().compare(left, right, &entities);
    assert_eq!(session.left_batch_id, left_id);
    assert_eq!(session.report.aggregate.delta, dec("22.00"));
}

// =============================================================================
// Property: marginal tiered payouts are monotonic in the driving metric
// =============================================================================

fn marginal_config() -> TierConfig {
    TierConfig {
        metric: "net_sales".to_string(),
        mode: Some(TierMode::Marginal),
        rate_kind: RateKind::Rate,
        tiers: vec![
            Tier {
                lower: dec("0"),
                rate: dec("0.05"),
            },
            Tier {
                lower: dec("1000"),
                rate: dec("0.08"),
            },
            Tier {
                lower: dec("5000"),
                rate: dec("0.10"),
            },
        ],
    }
}

proptest! {
    #[test]
    fn prop_marginal_payout_monotonic(a in 0u64..1_000_000, b in 0u64..1_000_000) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let config = marginal_config();
        let payout = |value: u64| {
            let metrics = BTreeMap::from([("net_sales".to_string(), Decimal::from(value))]);
            calculate_tiered("commission", &config, &metrics)
                .unwrap()
                .payout
        };
        prop_assert!(payout(low) <= payout(high));
    }

    #[test]
    fn prop_marginal_never_exceeds_top_rate(value in 0u64..1_000_000) {
        let config = marginal_config();
        let metrics = BTreeMap::from([("net_sales".to_string(), Decimal::from(value))]);
        let payout = calculate_tiered("commission", &config, &metrics)
            .unwrap()
            .payout;
        // The top marginal rate bounds the effective rate from above.
        prop_assert!(payout <= Decimal::from(value) * dec("0.10") + dec("0.01"));
    }
}
