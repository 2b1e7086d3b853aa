//! Metric resolution.
//!
//! The resolver turns an entity's committed raw rows plus a plan's declared
//! input bindings into a flat map of named numeric metrics. Resolution is
//! pure and deterministic: the same rows and bindings always yield the same
//! map, which is what makes downstream reconciliation reproducible.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};
use crate::models::{DerivationExpr, MetricMap, RawRow, RuleSet};

/// Resolves an entity's metrics from its committed rows.
///
/// Direct bindings copy a named raw field into a named metric with lenient
/// numeric coercion: an empty or non-numeric value becomes `0` unless the
/// binding is marked `required`, in which case resolution fails for that
/// entity with [`EngineError::MissingMetric`]. When an entity has several
/// rows carrying the same field, the last row wins (row order is part of the
/// committed input, so this stays deterministic).
///
/// Derivations are then evaluated in declaration order; a derivation
/// referencing a name that is neither a bound metric nor an earlier
/// derivation fails with [`EngineError::UnresolvedDependency`].
///
/// # Example
///
/// ```
/// use payout_engine::models::{InputBinding, PlanStatus, RawRow, RuleSet};
/// use payout_engine::resolver::resolve;
/// use rust_decimal::Decimal;
///
/// let rule_set = RuleSet {
///     id: "plan_1".to_string(),
///     tenant_id: "acme".to_string(),
///     name: "Sales Plan".to_string(),
///     version: 1,
///     status: PlanStatus::Active,
///     input_bindings: vec![InputBinding {
///         field: "sales".to_string(),
///         metric: "net_sales".to_string(),
///         required: false,
///     }],
///     derivations: vec![],
///     variants: vec![],
/// };
/// let rows = vec![RawRow::new("rep_001", [("sales", "6000")])];
///
/// let metrics = resolve(&rows, &rule_set, "rep_001").unwrap();
/// assert_eq!(metrics.get("net_sales"), Some(&Decimal::from(6000)));
/// ```
pub fn resolve(rows: &[RawRow], rule_set: &RuleSet, entity_id: &str) -> EngineResult<MetricMap> {
    let mut metrics = MetricMap::new();

    for binding in &rule_set.input_bindings {
        // Last row carrying the field wins.
        let raw = rows
            .iter()
            .filter(|row| row.entity_id == entity_id)
            .filter_map(|row| row.fields.get(&binding.field))
            .next_back();

        let value = raw.and_then(|raw| coerce_numeric(raw));
        match value {
            Some(value) => {
                metrics.insert(binding.metric.clone(), value);
            }
            None if binding.required => {
                return Err(EngineError::MissingMetric {
                    entity_id: entity_id.to_string(),
                    metric: binding.metric.clone(),
                });
            }
            None => {
                metrics.insert(binding.metric.clone(), Decimal::ZERO);
            }
        }
    }

    for derivation in &rule_set.derivations {
        let value = derive(&derivation.metric, &derivation.expr, &metrics)?;
        metrics.insert(derivation.metric.clone(), value);
    }

    Ok(metrics)
}

/// Lenient numeric coercion: trimmed decimal parse, `None` for empty or
/// non-numeric input.
fn coerce_numeric(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}

fn derive(metric: &str, expr: &DerivationExpr, metrics: &MetricMap) -> EngineResult<Decimal> {
    let lookup = |name: &str| -> EngineResult<Decimal> {
        metrics
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::UnresolvedDependency {
                metric: metric.to_string(),
                reference: name.to_string(),
            })
    };

    match expr {
        DerivationExpr::Sum { of } => {
            let mut sum = Decimal::ZERO;
            for name in of {
                sum += lookup(name)?;
            }
            Ok(sum)
        }
        DerivationExpr::Difference {
            minuend,
            subtrahend,
        } => Ok(lookup(minuend)? - lookup(subtrahend)?),
        DerivationExpr::Ratio {
            numerator,
            denominator,
        } => {
            let denominator = lookup(denominator)?;
            if denominator.is_zero() {
                Ok(Decimal::ZERO)
            } else {
                Ok(lookup(numerator)? / denominator)
            }
        }
    }
}
