//! Plan loading and validation.
//!
//! The [`PlanLoader`] reads a rule set (plan) document from YAML or JSON and
//! validates the whole nested schema before any entity is calculated, so
//! malformed configuration is rejected up front rather than discovered
//! mid-batch per entity.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    Component, ComponentConfig, RateKind, RuleSet, TierMode, Variant,
};

/// Loads and validates rule set documents.
///
/// # Example
///
/// ```no_run
/// use payout_engine::config::PlanLoader;
///
/// let loader = PlanLoader::load("./plans/sales_plan.yaml")?;
/// let rule_set = loader.rule_set();
/// println!("Loaded plan '{}' version {}", rule_set.name, rule_set.version);
/// # Ok::<(), payout_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PlanLoader {
    rule_set: RuleSet,
}

impl PlanLoader {
    /// Loads a plan from a YAML document on disk and validates it.
    ///
    /// # Errors
    ///
    /// Returns `PlanNotFound` if the file is missing, `PlanParseError` if it
    /// is not valid YAML for the plan schema, and `ConfigurationError` if
    /// the parsed plan fails structural validation.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::PlanNotFound {
            path: path_str.clone(),
        })?;

        Self::from_yaml(&path_str, &content)
    }

    /// Parses and validates a plan from a YAML string.
    ///
    /// Enum-typed plan elements (component configs, eligibility rules,
    /// expressions) are written as single-key maps (`config: { tiered: ... }`)
    /// rather than YAML `!tags`, so documents stay shaped like their JSON
    /// equivalents.
    pub fn from_yaml(source: &str, content: &str) -> EngineResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(content);
        let rule_set: RuleSet = serde_yaml::with::singleton_map_recursive::deserialize(
            deserializer,
        )
        .map_err(|e| EngineError::PlanParseError {
            path: source.to_string(),
            message: e.to_string(),
        })?;
        Self::from_rule_set(rule_set)
    }

    /// Parses and validates a plan from a JSON string.
    pub fn from_json(source: &str, content: &str) -> EngineResult<Self> {
        let rule_set: RuleSet =
            serde_json::from_str(content).map_err(|e| EngineError::PlanParseError {
                path: source.to_string(),
                message: e.to_string(),
            })?;
        Self::from_rule_set(rule_set)
    }

    /// Validates an already-constructed rule set.
    pub fn from_rule_set(rule_set: RuleSet) -> EngineResult<Self> {
        validate(&rule_set)?;
        Ok(Self { rule_set })
    }

    /// Returns the validated rule set.
    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    /// Consumes the loader, returning the validated rule set.
    pub fn into_rule_set(self) -> RuleSet {
        self.rule_set
    }
}

/// Validates the full plan schema.
fn validate(rule_set: &RuleSet) -> EngineResult<()> {
    let plan_context = format!("rule set '{}'", rule_set.id);
    if rule_set.variants.is_empty() {
        return Err(config_error(&plan_context, "plan has no variants"));
    }

    // Known metric names: bound metrics plus derivations, in order.
    let mut known_metrics: BTreeSet<&str> = rule_set
        .input_bindings
        .iter()
        .map(|b| b.metric.as_str())
        .collect();

    for derivation in &rule_set.derivations {
        for reference in derivation.expr.references() {
            if !known_metrics.contains(reference) {
                return Err(config_error(
                    &format!("derivation '{}'", derivation.metric),
                    &format!("references unknown metric '{reference}'"),
                ));
            }
        }
        known_metrics.insert(derivation.metric.as_str());
    }

    let mut variant_names = BTreeSet::new();
    let mut variant_ordinals = BTreeSet::new();
    for variant in &rule_set.variants {
        if !variant_names.insert(variant.name.as_str()) {
            return Err(config_error(
                &plan_context,
                &format!("duplicate variant name '{}'", variant.name),
            ));
        }
        if !variant_ordinals.insert(variant.ordinal) {
            return Err(config_error(
                &plan_context,
                &format!("duplicate variant ordinal {}", variant.ordinal),
            ));
        }
        validate_variant(variant, &known_metrics)?;
    }

    Ok(())
}

fn validate_variant(variant: &Variant, known_metrics: &BTreeSet<&str>) -> EngineResult<()> {
    let variant_context = format!("variant '{}'", variant.name);

    let mut component_names = BTreeSet::new();
    let mut component_ordinals = BTreeSet::new();
    // Components calculated before the one being validated, by ordinal.
    let mut earlier: BTreeSet<&str> = BTreeSet::new();

    for component in variant.ordered_components() {
        if !component_names.insert(component.name.as_str()) {
            return Err(config_error(
                &variant_context,
                &format!("duplicate component name '{}'", component.name),
            ));
        }
        if !component_ordinals.insert(component.ordinal) {
            return Err(config_error(
                &variant_context,
                &format!("duplicate component ordinal {}", component.ordinal),
            ));
        }
        validate_component(component, known_metrics, &earlier)?;
        earlier.insert(component.name.as_str());
    }

    Ok(())
}

fn validate_component(
    component: &Component,
    known_metrics: &BTreeSet<&str>,
    earlier: &BTreeSet<&str>,
) -> EngineResult<()> {
    let context = format!("component '{}'", component.name);

    match &component.config {
        ComponentConfig::Tiered(config) => {
            let mode = config
                .mode
                .ok_or_else(|| config_error(&context, "tier mode must be declared (marginal or cliff)"))?;
            if config.tiers.is_empty() {
                return Err(config_error(&context, "tier schedule is empty"));
            }
            if mode == TierMode::Marginal && config.rate_kind == RateKind::FlatAmount {
                return Err(config_error(
                    &context,
                    "flat-amount tiers cannot be used in marginal mode",
                ));
            }
            for window in config.tiers.windows(2) {
                if window[1].lower <= window[0].lower {
                    return Err(config_error(
                        &context,
                        &format!(
                            "tier thresholds must be strictly ascending ({} then {})",
                            window[0].lower, window[1].lower
                        ),
                    ));
                }
            }
        }
        ComponentConfig::Matrix(config) => {
            if config.row_bands.is_empty() || config.column_bands.is_empty() {
                return Err(config_error(&context, "matrix must declare row and column bands"));
            }
            validate_bands(&context, "row", &config.row_bands)?;
            validate_bands(&context, "column", &config.column_bands)?;
            if config.cells.len() != config.row_bands.len()
                || config
                    .cells
                    .iter()
                    .any(|row| row.len() != config.column_bands.len())
            {
                return Err(config_error(
                    &context,
                    &format!(
                        "cell grid must be {} rows × {} columns",
                        config.row_bands.len(),
                        config.column_bands.len()
                    ),
                ));
            }
        }
        ComponentConfig::AdditiveLookup(config) => {
            if config.rules.is_empty() {
                return Err(config_error(&context, "additive lookup has no rules"));
            }
            let mut rule_names = BTreeSet::new();
            for rule in &config.rules {
                if !rule_names.insert(rule.name.as_str()) {
                    return Err(config_error(
                        &context,
                        &format!("duplicate lookup rule name '{}'", rule.name),
                    ));
                }
                if let crate::models::LookupCondition::MetricInRange { lower, upper, .. } =
                    &rule.condition
                    && upper <= lower
                {
                    return Err(config_error(
                        &context,
                        &format!("rule '{}' has an empty range [{lower}, {upper})", rule.name),
                    ));
                }
            }
        }
        ComponentConfig::Formula(config) => {
            let mut component_refs = Vec::new();
            config.expr.component_references(&mut component_refs);
            for reference in component_refs {
                if !earlier.contains(reference) {
                    return Err(config_error(
                        &context,
                        &format!(
                            "formula references component '{reference}' which is not calculated earlier"
                        ),
                    ));
                }
            }
            validate_formula_metrics(&context, &config.expr, known_metrics)?;
        }
    }

    Ok(())
}

fn validate_formula_metrics(
    context: &str,
    expr: &crate::models::FormulaExpr,
    known_metrics: &BTreeSet<&str>,
) -> EngineResult<()> {
    use crate::models::FormulaExpr;
    match expr {
        FormulaExpr::Const(_) | FormulaExpr::Component(_) => Ok(()),
        FormulaExpr::Metric(name) => {
            if known_metrics.contains(name.as_str()) {
                Ok(())
            } else {
                Err(config_error(
                    context,
                    &format!("formula references unknown metric '{name}'"),
                ))
            }
        }
        FormulaExpr::Add(args) | FormulaExpr::Mul(args) => {
            for arg in args {
                validate_formula_metrics(context, arg, known_metrics)?;
            }
            Ok(())
        }
        FormulaExpr::Sub(left, right) | FormulaExpr::Div(left, right) => {
            validate_formula_metrics(context, left, known_metrics)?;
            validate_formula_metrics(context, right, known_metrics)
        }
    }
}

fn validate_bands(context: &str, axis: &str, bands: &[crate::models::Band]) -> EngineResult<()> {
    for band in bands {
        if let Some(upper) = band.upper
            && upper <= band.lower
        {
            return Err(config_error(
                context,
                &format!("{axis} band [{}, {upper}) is empty", band.lower),
            ));
        }
    }
    for window in bands.windows(2) {
        let overlaps = match window[0].upper {
            // An unbounded band anywhere but last swallows its successors.
            None => true,
            Some(upper) => window[1].lower < upper,
        };
        if overlaps {
            return Err(config_error(
                context,
                &format!(
                    "{axis} bands overlap near lower threshold {}",
                    window[1].lower
                ),
            ));
        }
    }
    Ok(())
}

fn config_error(context: &str, message: &str) -> EngineError {
    EngineError::ConfigurationError {
        context: context.to_string(),
        message: message.to_string(),
    }
}
