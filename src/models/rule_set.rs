//! Rule set (plan) schema.
//!
//! A rule set is a tenant's versioned compensation plan: input bindings that
//! map raw fields to canonical metrics, metric derivations, and an ordered
//! list of eligibility-gated variants, each holding an ordered list of
//! calculable components.
//!
//! The schema is strict and closed: component shapes are a tagged enum, not
//! open-ended dispatch, and ordering is an explicit persisted `ordinal`,
//! never inferred from storage iteration order. Structural validation happens
//! in [`crate::config::PlanLoader`] before any entity is calculated.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Entity, MetricMap};

/// Lifecycle status of a rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Under construction; not yet calculable against for publication.
    Draft,
    /// Live and calculable.
    Active,
    /// Retired; kept for audit and historical reconciliation.
    Archived,
}

/// Maps a raw committed field into a named canonical metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBinding {
    /// The raw field name as it appears in committed rows.
    pub field: String,
    /// The canonical metric name the field resolves to.
    pub metric: String,
    /// When true, an absent or non-numeric value fails the entity with
    /// `MissingMetric` instead of coercing to zero.
    #[serde(default)]
    pub required: bool,
}

/// The expression form for derived metrics.
///
/// Derivations are a closed schema rather than parsed strings, so malformed
/// expressions are impossible to represent and references are checkable at
/// load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationExpr {
    /// Sum of the named metrics.
    Sum {
        /// The metrics to add together.
        of: Vec<String>,
    },
    /// `minuend - subtrahend`.
    Difference {
        /// The metric subtracted from.
        minuend: String,
        /// The metric subtracted.
        subtrahend: String,
    },
    /// `numerator / denominator`; a zero denominator yields zero.
    Ratio {
        /// The numerator metric.
        numerator: String,
        /// The denominator metric.
        denominator: String,
    },
}

impl DerivationExpr {
    /// Returns every metric name this expression references.
    pub fn references(&self) -> Vec<&str> {
        match self {
            DerivationExpr::Sum { of } => of.iter().map(String::as_str).collect(),
            DerivationExpr::Difference {
                minuend,
                subtrahend,
            } => vec![minuend, subtrahend],
            DerivationExpr::Ratio {
                numerator,
                denominator,
            } => vec![numerator, denominator],
        }
    }
}

/// A derived metric computed from already-resolved metrics.
///
/// Derivations are evaluated in declaration order, so later derivations may
/// reference earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDerivation {
    /// The canonical name of the derived metric.
    pub metric: String,
    /// The expression producing the value.
    pub expr: DerivationExpr,
}

/// Eligibility predicate evaluated against an entity and its resolved metrics.
///
/// A closed combinator schema: variants either match unconditionally, test a
/// single entity attribute or metric, or combine sub-rules with all/any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityRule {
    /// Matches every entity.
    Always,
    /// Matches when every sub-rule matches.
    All(Vec<EligibilityRule>),
    /// Matches when at least one sub-rule matches.
    Any(Vec<EligibilityRule>),
    /// Matches when the entity attribute equals the given value.
    AttributeEquals {
        /// The attribute key.
        key: String,
        /// The required attribute value.
        value: String,
    },
    /// Matches when the named metric is at least `value` (missing metrics
    /// are treated as zero).
    MetricAtLeast {
        /// The metric name.
        metric: String,
        /// The inclusive lower bound.
        value: Decimal,
    },
    /// Matches when the named metric is strictly below `value`.
    MetricBelow {
        /// The metric name.
        metric: String,
        /// The exclusive upper bound.
        value: Decimal,
    },
}

impl EligibilityRule {
    /// Evaluates the predicate against an entity and its resolved metrics.
    ///
    /// Evaluation is pure and total: unknown attributes never match an
    /// equality test and unknown metrics are treated as zero, so selection
    /// is deterministic for any input.
    pub fn matches(&self, entity: &Entity, metrics: &MetricMap) -> bool {
        match self {
            EligibilityRule::Always => true,
            EligibilityRule::All(rules) => rules.iter().all(|r| r.matches(entity, metrics)),
            EligibilityRule::Any(rules) => rules.iter().any(|r| r.matches(entity, metrics)),
            EligibilityRule::AttributeEquals { key, value } => {
                entity.attribute(key) == Some(value.as_str())
            }
            EligibilityRule::MetricAtLeast { metric, value } => {
                metrics.get(metric).copied().unwrap_or(Decimal::ZERO) >= *value
            }
            EligibilityRule::MetricBelow { metric, value } => {
                metrics.get(metric).copied().unwrap_or(Decimal::ZERO) < *value
            }
        }
    }
}

/// How a tier's `rate` value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    /// The rate multiplies the driving metric (or the slice within a tier).
    Rate,
    /// The rate is a flat amount paid when the tier matches (cliff only).
    FlatAmount,
}

/// Whether a tiered component pays marginally or on the matched tier alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierMode {
    /// Each tier's rate applies only to the slice of value within that tier,
    /// like a tax bracket schedule.
    Marginal,
    /// The single matched tier's rate applies to the entire value.
    Cliff,
}

/// One tier in a tiered/banded schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Inclusive lower threshold; the tier covers values from here up to
    /// (exclusive of) the next tier's lower threshold.
    pub lower: Decimal,
    /// The rate or flat amount for this tier, per [`RateKind`].
    pub rate: Decimal,
}

/// Configuration for a tiered/banded component.
///
/// `mode` is deliberately optional at the serde layer and mandatory at
/// validation: an unspecified mode is a configuration error, never a guessed
/// default, since marginal and cliff produce materially different payouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// The driving metric name.
    pub metric: String,
    /// Marginal or cliff; `None` is rejected at load time.
    pub mode: Option<TierMode>,
    /// How tier rates are interpreted.
    #[serde(default = "default_rate_kind")]
    pub rate_kind: RateKind,
    /// The tier schedule, strictly ascending by `lower`.
    pub tiers: Vec<Tier>,
}

fn default_rate_kind() -> RateKind {
    RateKind::Rate
}

/// A half-open value band `[lower, upper)`; `upper: None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    /// Inclusive lower bound.
    pub lower: Decimal,
    /// Exclusive upper bound, or `None` for unbounded.
    #[serde(default)]
    pub upper: Option<Decimal>,
}

impl Band {
    /// Returns true if the value falls within the band.
    pub fn contains(&self, value: Decimal) -> bool {
        value >= self.lower && self.upper.is_none_or(|upper| value < upper)
    }
}

/// Configuration for a two-axis matrix component.
///
/// `cells` is a dense row-major grid: `cells[r][c]` is the payout for row
/// band `r` and column band `c`. Dimensions are validated against the band
/// lists at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// The metric banded along the row axis.
    pub row_metric: String,
    /// The metric banded along the column axis.
    pub column_metric: String,
    /// Row bands in declaration order.
    pub row_bands: Vec<Band>,
    /// Column bands in declaration order.
    pub column_bands: Vec<Band>,
    /// Dense payout grid, row-major.
    pub cells: Vec<Vec<Decimal>>,
}

/// Metric-only condition gating one additive lookup rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupCondition {
    /// The rule always contributes.
    Always,
    /// Contributes when the metric is at least `value`.
    MetricAtLeast {
        /// The metric name.
        metric: String,
        /// The inclusive lower bound.
        value: Decimal,
    },
    /// Contributes when the metric falls in `[lower, upper)`.
    MetricInRange {
        /// The metric name.
        metric: String,
        /// Inclusive lower bound.
        lower: Decimal,
        /// Exclusive upper bound.
        upper: Decimal,
    },
}

impl LookupCondition {
    /// Evaluates the condition against resolved metrics (missing metrics are
    /// treated as zero).
    pub fn matches(&self, metrics: &MetricMap) -> bool {
        let value_of =
            |metric: &str| -> Decimal { metrics.get(metric).copied().unwrap_or(Decimal::ZERO) };
        match self {
            LookupCondition::Always => true,
            LookupCondition::MetricAtLeast { metric, value } => value_of(metric) >= *value,
            LookupCondition::MetricInRange {
                metric,
                lower,
                upper,
            } => {
                let v = value_of(metric);
                v >= *lower && v < *upper
            }
        }
    }
}

/// One independent rule within an additive lookup component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRule {
    /// Rule name, used in traces.
    pub name: String,
    /// The gating condition.
    pub condition: LookupCondition,
    /// The amount contributed when the condition matches.
    pub amount: Decimal,
    /// When set, the contribution is `amount × metric value` instead of a
    /// flat amount.
    #[serde(default)]
    pub per_unit_metric: Option<String>,
}

/// Configuration for an additive lookup component: several independent
/// bonus rules that can co-occur, summed with no short-circuiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// The rules, all evaluated.
    pub rules: Vec<LookupRule>,
}

/// A strict arithmetic expression over resolved metrics and earlier
/// components' payouts.
///
/// The tree is a closed serde schema, so malformed formulas are rejected at
/// parse time and name references are checkable at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaExpr {
    /// A literal constant.
    Const(Decimal),
    /// The value of a resolved metric.
    Metric(String),
    /// The payout of an earlier component in the same variant.
    Component(String),
    /// Sum of the operands.
    Add(Vec<FormulaExpr>),
    /// Left minus right.
    Sub(Box<FormulaExpr>, Box<FormulaExpr>),
    /// Product of the operands.
    Mul(Vec<FormulaExpr>),
    /// Left divided by right; a zero denominator yields zero with a trace.
    Div(Box<FormulaExpr>, Box<FormulaExpr>),
}

impl FormulaExpr {
    /// Collects every component name the expression references.
    pub fn component_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FormulaExpr::Const(_) | FormulaExpr::Metric(_) => {}
            FormulaExpr::Component(name) => out.push(name),
            FormulaExpr::Add(args) | FormulaExpr::Mul(args) => {
                for arg in args {
                    arg.component_references(out);
                }
            }
            FormulaExpr::Sub(left, right) | FormulaExpr::Div(left, right) => {
                left.component_references(out);
                right.component_references(out);
            }
        }
    }
}

/// Configuration for a formula component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaConfig {
    /// The expression to evaluate.
    pub expr: FormulaExpr,
}

/// The closed set of component shapes.
///
/// Each variant has exactly one calculation function in
/// [`crate::calculation`], selected by this tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentConfig {
    /// Tiered/banded schedule over one driving metric.
    Tiered(TierConfig),
    /// Two-axis banded matrix.
    Matrix(MatrixConfig),
    /// Additive lookup over independent rules.
    AdditiveLookup(LookupConfig),
    /// Arithmetic formula over metrics and earlier components.
    Formula(FormulaConfig),
}

/// The type tag of a component, carried on results for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    /// Tiered/banded component.
    Tiered,
    /// Two-axis matrix component.
    Matrix,
    /// Additive lookup component.
    AdditiveLookup,
    /// Formula component.
    Formula,
}

impl ComponentConfig {
    /// Returns the type tag for this configuration.
    pub fn component_type(&self) -> ComponentType {
        match self {
            ComponentConfig::Tiered(_) => ComponentType::Tiered,
            ComponentConfig::Matrix(_) => ComponentType::Matrix,
            ComponentConfig::AdditiveLookup(_) => ComponentType::AdditiveLookup,
            ComponentConfig::Formula(_) => ComponentType::Formula,
        }
    }
}

/// One calculable payout unit within a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Component name, unique within the variant; formula components
    /// reference earlier components by this name.
    pub name: String,
    /// Explicit persisted position; components are calculated in ascending
    /// ordinal order.
    pub ordinal: u32,
    /// The type-specific configuration.
    pub config: ComponentConfig,
}

/// An eligibility-gated alternative rule configuration within a rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Variant name (e.g. "certified", "standard").
    pub name: String,
    /// Explicit persisted position; selection is first-match in ascending
    /// ordinal order.
    pub ordinal: u32,
    /// The eligibility predicate.
    pub eligibility: EligibilityRule,
    /// The components, calculated in ascending ordinal order.
    pub components: Vec<Component>,
}

impl Variant {
    /// Returns the components sorted by their persisted ordinal.
    pub fn ordered_components(&self) -> Vec<&Component> {
        let mut components: Vec<&Component> = self.components.iter().collect();
        components.sort_by_key(|c| c.ordinal);
        components
    }
}

/// A tenant's versioned compensation plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rule set identifier, stable across versions.
    pub id: String,
    /// The tenant this plan belongs to.
    pub tenant_id: String,
    /// Human-readable plan name.
    pub name: String,
    /// Version number; published versions are append-only.
    pub version: u32,
    /// Lifecycle status.
    pub status: PlanStatus,
    /// Raw-field-to-metric bindings.
    pub input_bindings: Vec<InputBinding>,
    /// Derived metrics, evaluated in declaration order.
    #[serde(default)]
    pub derivations: Vec<MetricDerivation>,
    /// The variants, selected first-match in ascending ordinal order.
    pub variants: Vec<Variant>,
}

impl RuleSet {
    /// Returns the variants sorted by their persisted ordinal.
    pub fn ordered_variants(&self) -> Vec<&Variant> {
        let mut variants: Vec<&Variant> = self.variants.iter().collect();
        variants.sort_by_key(|v| v.ordinal);
        variants
    }
}
