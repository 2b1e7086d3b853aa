//! Tiered/banded component calculation.
//!
//! A tiered component pays against an ordered schedule of lower thresholds.
//! Two modes are supported and must be declared in configuration:
//!
//! - **Marginal**: each tier's rate applies only to the slice of the driving
//!   metric within that tier, like a tax bracket schedule.
//! - **Cliff**: the single matched tier's rate applies to the entire value.
//!
//! Tier matching is inclusive of a tier's lower threshold and exclusive of
//! the next tier's lower threshold. A value below the lowest tier yields a
//! zero payout with a "below threshold" trace, never an error.

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::models::{ComponentTrace, MetricMap, RateKind, TierConfig, TierMode};

use super::{ComponentOutcome, round_payout};

/// Calculates a tiered/banded component payout.
///
/// # Errors
///
/// Returns `ConfigurationError` when the tier mode is undeclared, the
/// schedule is empty, or a flat-amount schedule is used in marginal mode.
/// Load-time validation rejects all of these before a batch starts; the
/// guards here keep the calculator total for hand-built configurations.
///
/// # Example
///
/// ```
/// use payout_engine::calculation::calculate_tiered;
/// use payout_engine::models::{MetricMap, RateKind, Tier, TierConfig, TierMode};
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let dec = |s: &str| Decimal::from_str(s).unwrap();
/// let config = TierConfig {
///     metric: "net_sales".to_string(),
///     mode: Some(TierMode::Marginal),
///     rate_kind: RateKind::Rate,
///     tiers: vec![
///         Tier { lower: dec("0"), rate: dec("0.05") },
///         Tier { lower: dec("1000"), rate: dec("0.08") },
///         Tier { lower: dec("5000"), rate: dec("0.10") },
///     ],
/// };
/// let metrics = MetricMap::from([("net_sales".to_string(), dec("6000"))]);
///
/// let outcome = calculate_tiered("commission", &config, &metrics).unwrap();
/// // 0.05 × 1000 + 0.08 × 4000 + 0.10 × 1000
/// assert_eq!(outcome.payout, dec("470.00"));
/// ```
pub fn calculate_tiered(
    component_name: &str,
    config: &TierConfig,
    metrics: &MetricMap,
) -> EngineResult<ComponentOutcome> {
    let mode = config.mode.ok_or_else(|| EngineError::ConfigurationError {
        context: format!("component '{component_name}'"),
        message: "tier mode must be declared (marginal or cliff)".to_string(),
    })?;

    if config.tiers.is_empty() {
        return Err(EngineError::ConfigurationError {
            context: format!("component '{component_name}'"),
            message: "tier schedule is empty".to_string(),
        });
    }

    if mode == TierMode::Marginal && config.rate_kind == RateKind::FlatAmount {
        return Err(EngineError::ConfigurationError {
            context: format!("component '{component_name}'"),
            message: "flat-amount tiers cannot be used in marginal mode".to_string(),
        });
    }

    let value = metrics
        .get(&config.metric)
        .copied()
        .unwrap_or(Decimal::ZERO);

    let mode_str = match mode {
        TierMode::Marginal => "marginal",
        TierMode::Cliff => "cliff",
    };
    let input = serde_json::json!({
        "metric": config.metric,
        "value": value.normalize().to_string(),
        "mode": mode_str,
    });

    // Below the lowest tier there is nothing to pay.
    if value < config.tiers[0].lower {
        return Ok(ComponentOutcome {
            payout: Decimal::ZERO,
            trace: ComponentTrace {
                input,
                output: serde_json::json!({
                    "payout": "0",
                    "below_threshold": true,
                }),
                reasoning: format!(
                    "{} = {} is below the lowest tier threshold {}; no payout",
                    config.metric,
                    value.normalize(),
                    config.tiers[0].lower.normalize()
                ),
            },
        });
    }

    match mode {
        TierMode::Marginal => {
            let mut total = Decimal::ZERO;
            let mut slices = Vec::new();
            let mut terms = Vec::new();

            for (index, tier) in config.tiers.iter().enumerate() {
                if value <= tier.lower {
                    break;
                }
                let upper = config
                    .tiers
                    .get(index + 1)
                    .map(|next| next.lower)
                    .unwrap_or(value);
                let slice = value.min(upper) - tier.lower;
                if slice <= Decimal::ZERO {
                    continue;
                }
                total += slice * tier.rate;
                slices.push(serde_json::json!({
                    "tier": index,
                    "lower": tier.lower.normalize().to_string(),
                    "slice": slice.normalize().to_string(),
                    "rate": tier.rate.normalize().to_string(),
                }));
                terms.push(format!(
                    "{} × {}",
                    slice.normalize(),
                    tier.rate.normalize()
                ));
            }

            let payout = round_payout(total);
            Ok(ComponentOutcome {
                payout,
                trace: ComponentTrace {
                    input,
                    output: serde_json::json!({
                        "slices": slices,
                        "payout": payout.normalize().to_string(),
                    }),
                    reasoning: format!(
                        "Marginal tiers over {} = {}: {} = {}",
                        config.metric,
                        value.normalize(),
                        terms.join(" + "),
                        payout.normalize()
                    ),
                },
            })
        }
        TierMode::Cliff => {
            // Last tier whose lower threshold the value reaches.
            let (index, tier) = config
                .tiers
                .iter()
                .enumerate()
                .rev()
                .find(|(_, tier)| value >= tier.lower)
                .unwrap_or((0, &config.tiers[0]));

            let (raw, reasoning) = match config.rate_kind {
                RateKind::Rate => (
                    value * tier.rate,
                    format!(
                        "Cliff tier {} (lower {}) matched {} = {}: {} × {} = {}",
                        index,
                        tier.lower.normalize(),
                        config.metric,
                        value.normalize(),
                        value.normalize(),
                        tier.rate.normalize(),
                        round_payout(value * tier.rate).normalize()
                    ),
                ),
                RateKind::FlatAmount => (
                    tier.rate,
                    format!(
                        "Cliff tier {} (lower {}) matched {} = {}: flat amount {}",
                        index,
                        tier.lower.normalize(),
                        config.metric,
                        value.normalize(),
                        tier.rate.normalize()
                    ),
                ),
            };

            let payout = round_payout(raw);
            Ok(ComponentOutcome {
                payout,
                trace: ComponentTrace {
                    input,
                    output: serde_json::json!({
                        "matched_tier": index,
                        "rate": tier.rate.normalize().to_string(),
                        "payout": payout.normalize().to_string(),
                    }),
                    reasoning,
                },
            })
        }
    }
}
