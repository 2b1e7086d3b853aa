//! Formula component calculation.
//!
//! A formula component evaluates a declared arithmetic expression over
//! resolved metrics and/or the payouts of components calculated earlier in
//! the same variant (components run in declared order, so later formulas may
//! reference earlier ones by name). A formula referencing an unresolved name
//! fails the entity with `UnresolvedReference`.

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::models::{ComponentTrace, FormulaConfig, FormulaExpr, MetricMap};

use super::{ComponentOutcome, ComponentPayouts, round_payout};

fn evaluate(
    component_name: &str,
    expr: &FormulaExpr,
    metrics: &MetricMap,
    prior: &ComponentPayouts,
    divided_by_zero: &mut bool,
) -> EngineResult<Decimal> {
    match expr {
        FormulaExpr::Const(value) => Ok(*value),
        FormulaExpr::Metric(name) => {
            metrics
                .get(name)
                .copied()
                .ok_or_else(|| EngineError::UnresolvedReference {
                    component: component_name.to_string(),
                    reference: name.clone(),
                })
        }
        FormulaExpr::Component(name) => {
            prior
                .get(name)
                .copied()
                .ok_or_else(|| EngineError::UnresolvedReference {
                    component: component_name.to_string(),
                    reference: name.clone(),
                })
        }
        FormulaExpr::Add(args) => {
            let mut sum = Decimal::ZERO;
            for arg in args {
                sum += evaluate(component_name, arg, metrics, prior, divided_by_zero)?;
            }
            Ok(sum)
        }
        FormulaExpr::Mul(args) => {
            let mut product = Decimal::ONE;
            for arg in args {
                product *= evaluate(component_name, arg, metrics, prior, divided_by_zero)?;
            }
            Ok(product)
        }
        FormulaExpr::Sub(left, right) => {
            let left = evaluate(component_name, left, metrics, prior, divided_by_zero)?;
            let right = evaluate(component_name, right, metrics, prior, divided_by_zero)?;
            Ok(left - right)
        }
        FormulaExpr::Div(left, right) => {
            let left = evaluate(component_name, left, metrics, prior, divided_by_zero)?;
            let right = evaluate(component_name, right, metrics, prior, divided_by_zero)?;
            if right.is_zero() {
                // A zero denominator is a data condition (e.g. zero hours),
                // not a configuration defect: the quotient contributes zero.
                *divided_by_zero = true;
                Ok(Decimal::ZERO)
            } else {
                Ok(left / right)
            }
        }
    }
}

/// Calculates a formula component payout.
///
/// # Errors
///
/// Returns `UnresolvedReference` (entity-scoped) when the expression cites a
/// name that is neither a resolved metric nor an earlier component's payout.
pub fn calculate_formula(
    component_name: &str,
    config: &FormulaConfig,
    metrics: &MetricMap,
    prior: &ComponentPayouts,
) -> EngineResult<ComponentOutcome> {
    let mut divided_by_zero = false;
    let raw = evaluate(
        component_name,
        &config.expr,
        metrics,
        prior,
        &mut divided_by_zero,
    )?;
    let payout = round_payout(raw);

    let reasoning = if divided_by_zero {
        format!(
            "Formula evaluated to {} (a zero denominator contributed 0)",
            payout.normalize()
        )
    } else {
        format!("Formula evaluated to {}", payout.normalize())
    };

    Ok(ComponentOutcome {
        payout,
        trace: ComponentTrace {
            input: serde_json::json!({
                "component": component_name,
                "available_components": prior.keys().collect::<Vec<_>>(),
            }),
            output: serde_json::json!({
                "payout": payout.normalize().to_string(),
                "divided_by_zero": divided_by_zero,
            }),
            reasoning,
        },
    })
}
