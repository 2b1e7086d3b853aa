//! Additive lookup component calculation.
//!
//! An additive lookup component sums payouts from multiple independent rules
//! (e.g. several bonus conditions that can co-occur). Every rule is
//! evaluated; no rule short-circuits another.

use rust_decimal::Decimal;

use crate::error::EngineResult;
use crate::models::{ComponentTrace, LookupConfig, MetricMap};

use super::{ComponentOutcome, round_payout};

/// Calculates an additive lookup component payout.
///
/// Each matching rule contributes its flat `amount`, or `amount × metric`
/// when a `per_unit_metric` is declared (missing metrics contribute as
/// zero). The rounded sum of contributions is the component payout.
pub fn calculate_additive_lookup(
    component_name: &str,
    config: &LookupConfig,
    metrics: &MetricMap,
) -> EngineResult<ComponentOutcome> {
    let mut total = Decimal::ZERO;
    let mut entries = Vec::new();
    let mut matched_names = Vec::new();

    for rule in &config.rules {
        let matched = rule.condition.matches(metrics);
        let contribution = if matched {
            match &rule.per_unit_metric {
                Some(metric) => {
                    let units = metrics.get(metric).copied().unwrap_or(Decimal::ZERO);
                    rule.amount * units
                }
                None => rule.amount,
            }
        } else {
            Decimal::ZERO
        };
        total += contribution;
        if matched {
            matched_names.push(rule.name.clone());
        }
        entries.push(serde_json::json!({
            "rule": rule.name,
            "matched": matched,
            "contribution": contribution.normalize().to_string(),
        }));
    }

    let payout = round_payout(total);
    let reasoning = if matched_names.is_empty() {
        "No lookup rule matched; no payout".to_string()
    } else {
        format!(
            "Rules [{}] matched for a combined payout of {}",
            matched_names.join(", "),
            payout.normalize()
        )
    };

    Ok(ComponentOutcome {
        payout,
        trace: ComponentTrace {
            input: serde_json::json!({
                "component": component_name,
                "rules": config.rules.len(),
            }),
            output: serde_json::json!({
                "entries": entries,
                "payout": payout.normalize().to_string(),
            }),
            reasoning,
        },
    })
}
