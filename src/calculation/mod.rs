//! Component calculators for the payout engine.
//!
//! One calculation function per component shape (tiered/banded, two-axis
//! matrix, additive lookup, formula), selected by the closed
//! [`ComponentConfig`](crate::models::ComponentConfig) tag. Calculators are
//! pure: they never mutate their inputs and never raise for "no payout" —
//! a zero payout always comes with a trace explaining why.

mod additive;
mod formula;
mod matrix;
mod round;
mod tiered;

pub use additive::calculate_additive_lookup;
pub use formula::calculate_formula;
pub use matrix::calculate_matrix;
pub use round::round_payout;
pub use tiered::calculate_tiered;

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::error::EngineResult;
use crate::models::{Component, ComponentConfig, ComponentTrace, MetricMap};

/// Payouts of components already calculated within the same variant, keyed
/// by component name. Formula components may reference these.
pub type ComponentPayouts = BTreeMap<String, Decimal>;

/// The output of one component calculation: a rounded payout and the trace
/// explaining it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentOutcome {
    /// The payout, rounded to 2 decimal places (round-half-up) exactly once.
    pub payout: Decimal,
    /// The explainability trace.
    pub trace: ComponentTrace,
}

/// Calculates one component against resolved metrics.
///
/// `prior` carries the payouts of earlier components in the same variant so
/// formula components can reference them by name.
///
/// # Errors
///
/// Entity-scoped: `UnresolvedReference` when a formula cites an unknown
/// name. Configuration-scoped: `ConfigurationError` for malformed
/// configuration that survived to calculation time (load-time validation
/// normally rejects these first).
pub fn calculate_component(
    component: &Component,
    metrics: &MetricMap,
    prior: &ComponentPayouts,
) -> EngineResult<ComponentOutcome> {
    match &component.config {
        ComponentConfig::Tiered(config) => calculate_tiered(&component.name, config, metrics),
        ComponentConfig::Matrix(config) => calculate_matrix(&component.name, config, metrics),
        ComponentConfig::AdditiveLookup(config) => {
            calculate_additive_lookup(&component.name, config, metrics)
        }
        ComponentConfig::Formula(config) => {
            calculate_formula(&component.name, config, metrics, prior)
        }
    }
}
