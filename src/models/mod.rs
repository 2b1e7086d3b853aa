//! Data models for the payout engine.
//!
//! This module contains the plain-data types consumed and produced at the
//! engine boundary: entities and periods, committed metric rows, the
//! rule-set (plan) schema, and calculation batch/result records.

mod entity;
mod metric;
mod period;
mod result;
mod rule_set;

pub use entity::Entity;
pub use metric::{MetricFact, MetricMap, RawRow};
pub use period::Period;
pub use result::{
    BatchManifest, BatchStatus, CalculationBatch, CalculationResult, ComponentResult,
    ComponentTrace, EntityOutcome,
};
pub use rule_set::{
    Band, Component, ComponentConfig, ComponentType, DerivationExpr, EligibilityRule,
    FormulaConfig, FormulaExpr, InputBinding, LookupCondition, LookupConfig, LookupRule,
    MatrixConfig, MetricDerivation, PlanStatus, RateKind, RuleSet, Tier, TierConfig, TierMode,
    Variant,
};
