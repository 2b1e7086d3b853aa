//! Batch execution: orchestrates metric resolution, variant selection and
//! component calculation across the full entity set for a period.
//!
//! Entities are independent (no entity's calculation reads another's state),
//! so the runner fans out across tokio tasks bounded by the configured
//! concurrency limit. Results are collected into a map keyed by entity id,
//! making the emitted result set independent of completion order. A batch is
//! immutable once built; re-running produces a new batch with a new id.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calculation::{ComponentPayouts, calculate_component, round_payout};
use crate::config::EngineSettings;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    BatchManifest, BatchStatus, CalculationBatch, CalculationResult, ComponentResult, Entity,
    EntityOutcome, MetricMap, Period, RawRow, RuleSet,
};
use crate::resolver::resolve;
use crate::selector::{Selection, select};

/// Cooperative cancellation handle for a running batch.
///
/// Cancelling stops the runner from dispatching new entity work; in-flight
/// entity calculations finish and are kept, and the batch is recorded as
/// [`BatchStatus::Partial`].
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Creates a fresh, un-cancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Calculates one entity against a rule set: resolve metrics, select a
/// variant, calculate its components in declared order, sum the payouts.
///
/// Entity-scoped failures (`MissingMetric`, `UnresolvedDependency`,
/// `UnresolvedReference`) are folded into a `Failed` result rather than
/// returned as errors; only configuration-scoped failures propagate, since
/// they would repeat identically for every entity.
pub fn calculate_entity(
    rule_set: &RuleSet,
    period: &Period,
    entity: &Entity,
    rows: &[RawRow],
) -> EngineResult<CalculationResult> {
    let empty = |outcome: EntityOutcome, reason: Option<String>, metrics: MetricMap| {
        CalculationResult {
            entity_id: entity.id.clone(),
            rule_set_id: rule_set.id.clone(),
            period_key: period.key.clone(),
            outcome,
            failure_reason: reason,
            variant: None,
            total_payout: Decimal::ZERO,
            components: Vec::new(),
            metrics,
        }
    };

    let metrics = match resolve(rows, rule_set, &entity.id) {
        Ok(metrics) => metrics,
        Err(err) if err.is_entity_scoped() => {
            return Ok(empty(EntityOutcome::Failed, Some(err.to_string()), MetricMap::new()));
        }
        Err(err) => return Err(err),
    };

    let variant = match select(rule_set, entity, &metrics) {
        Selection::Selected(variant) => variant,
        Selection::NoMatch => {
            return Ok(empty(EntityOutcome::NoMatch, None, metrics));
        }
    };

    let mut components = Vec::new();
    let mut prior = ComponentPayouts::new();
    for component in variant.ordered_components() {
        let outcome = match calculate_component(component, &metrics, &prior) {
            Ok(outcome) => outcome,
            Err(err) if err.is_entity_scoped() => {
                return Ok(empty(EntityOutcome::Failed, Some(err.to_string()), metrics));
            }
            Err(err) => return Err(err),
        };
        prior.insert(component.name.clone(), outcome.payout);
        components.push(ComponentResult {
            component_name: component.name.clone(),
            component_type: component.config.component_type(),
            payout: outcome.payout,
            trace: outcome.trace,
        });
    }

    let total: Decimal = components.iter().map(|c| c.payout).sum();
    Ok(CalculationResult {
        entity_id: entity.id.clone(),
        rule_set_id: rule_set.id.clone(),
        period_key: period.key.clone(),
        outcome: EntityOutcome::Ok,
        failure_reason: None,
        variant: Some(variant.name.clone()),
        // Components are already rounded, so this re-round is a no-op kept
        // to pin the total-equals-component-sum invariant.
        total_payout: round_payout(total),
        components,
        metrics,
    })
}

/// Runs calculation batches.
#[derive(Debug, Clone, Default)]
pub struct BatchRunner {
    settings: EngineSettings,
}

impl BatchRunner {
    /// Creates a runner with the given settings.
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Runs one batch against (rule set, period) for the given entities.
    ///
    /// Blocks (from the caller's perspective) until every dispatched entity
    /// has finished. Entity-scoped failures are recorded in the manifest and
    /// never abort the batch; a configuration-scoped failure aborts
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriod` for inconsistent period bounds and
    /// `ConfigurationError` for malformed plan configuration.
    pub async fn run(
        &self,
        rule_set: &RuleSet,
        period: &Period,
        entities: &[Entity],
        rows: &[RawRow],
        cancel: &CancelHandle,
    ) -> EngineResult<CalculationBatch> {
        period.validate()?;

        let batch_id = Uuid::new_v4();
        info!(
            batch_id = %batch_id,
            rule_set = %rule_set.id,
            period = %period.key,
            entities = entities.len(),
            "starting calculation batch"
        );

        // Pre-shard rows per entity so each task only carries its own data.
        let mut rows_by_entity: BTreeMap<String, Vec<RawRow>> = BTreeMap::new();
        for row in rows {
            rows_by_entity
                .entry(row.entity_id.clone())
                .or_default()
                .push(row.clone());
        }

        let shared_rule_set = Arc::new(rule_set.clone());
        let shared_period = Arc::new(period.clone());
        let permits = self
            .settings
            .concurrency
            .unwrap_or(Semaphore::MAX_PERMITS)
            .min(Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut tasks: JoinSet<EngineResult<CalculationResult>> = JoinSet::new();
        let mut cancelled = false;

        for entity in entities {
            if cancel.is_cancelled() {
                warn!(batch_id = %batch_id, "batch cancelled; no further entities dispatched");
                cancelled = true;
                break;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let rule_set = Arc::clone(&shared_rule_set);
            let period = Arc::clone(&shared_period);
            let entity = entity.clone();
            let entity_rows = rows_by_entity.remove(&entity.id).unwrap_or_default();

            tasks.spawn(async move {
                let result = calculate_entity(&rule_set, &period, &entity, &entity_rows);
                drop(permit);
                result
            });
        }

        let mut results: BTreeMap<String, CalculationResult> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| EngineError::ConfigurationError {
                context: "batch runner".to_string(),
                message: format!("entity calculation task failed: {e}"),
            })??;
            debug!(
                entity = %result.entity_id,
                outcome = ?result.outcome,
                total = %result.total_payout,
                "entity calculated"
            );
            results.insert(result.entity_id.clone(), result);
        }

        let mut manifest = BatchManifest::default();
        for result in results.values() {
            match result.outcome {
                EntityOutcome::Ok => manifest.ok += 1,
                EntityOutcome::NoMatch => manifest.no_match += 1,
                EntityOutcome::Failed => {
                    manifest.failed += 1;
                    if let Some(reason) = &result.failure_reason {
                        manifest
                            .failure_reasons
                            .insert(result.entity_id.clone(), reason.clone());
                    }
                }
            }
        }

        let status = if cancelled {
            BatchStatus::Partial
        } else {
            BatchStatus::Complete
        };
        info!(
            batch_id = %batch_id,
            ok = manifest.ok,
            no_match = manifest.no_match,
            failed = manifest.failed,
            status = ?status,
            "calculation batch finished"
        );

        Ok(CalculationBatch {
            batch_id,
            tenant_id: rule_set.tenant_id.clone(),
            rule_set_id: rule_set.id.clone(),
            rule_set_version: rule_set.version,
            period_key: period.key.clone(),
            created_at: Utc::now(),
            status,
            results,
            manifest,
        })
    }
}
