//! Error types for the payout engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that can occur during plan loading, metric
//! resolution, component calculation and batch execution.
//!
//! The taxonomy distinguishes entity-scoped failures (which are recorded
//! against a single entity's result and never abort a batch) from
//! configuration-scoped failures (which abort the whole run, since they
//! would repeat identically for every entity).

use thiserror::Error;

/// The main error type for the payout engine.
///
/// # Example
///
/// ```
/// use payout_engine::error::EngineError;
///
/// let error = EngineError::PlanNotFound {
///     path: "/missing/plan.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Plan document not found: /missing/plan.yaml");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Plan document was not found at the specified path.
    #[error("Plan document not found: {path}")]
    PlanNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Plan document could not be parsed.
    #[error("Failed to parse plan document '{path}': {message}")]
    PlanParseError {
        /// The path to the document that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// Plan configuration is structurally invalid.
    ///
    /// This is a configuration-scoped failure: it affects every entity
    /// identically and aborts the batch rather than being retried per entity.
    #[error("Invalid configuration in {context}: {message}")]
    ConfigurationError {
        /// The plan element the defect was found in (e.g. a component name).
        context: String,
        /// A description of what made the configuration invalid.
        message: String,
    },

    /// A metric marked required by an input binding was absent or
    /// non-numeric in the committed data for one entity.
    #[error("Missing required metric '{metric}' for entity '{entity_id}'")]
    MissingMetric {
        /// The entity whose resolution failed.
        entity_id: String,
        /// The required metric that could not be resolved.
        metric: String,
    },

    /// A metric derivation referenced a metric that was not resolved.
    #[error("Derivation of metric '{metric}' references unresolved metric '{reference}'")]
    UnresolvedDependency {
        /// The derived metric being computed.
        metric: String,
        /// The name that could not be resolved.
        reference: String,
    },

    /// A formula component referenced a name that is neither a resolved
    /// metric nor an earlier component's payout.
    #[error("Formula component '{component}' references unresolved name '{reference}'")]
    UnresolvedReference {
        /// The formula component being evaluated.
        component: String,
        /// The name that could not be resolved.
        reference: String,
    },

    /// A period had inconsistent bounds.
    #[error("Invalid period '{key}': {message}")]
    InvalidPeriod {
        /// The period key.
        key: String,
        /// A description of what made the period invalid.
        message: String,
    },

    /// A rule set write would mutate a version already published against.
    #[error("Rule set '{rule_set_id}' version {version} is published and append-only")]
    RuleSetImmutable {
        /// The rule set identifier.
        rule_set_id: String,
        /// The published version that was targeted.
        version: u32,
    },
}

impl EngineError {
    /// Returns true if this failure is scoped to a single entity.
    ///
    /// Entity-scoped failures are recorded in the batch manifest against the
    /// failing entity and never abort the batch. Everything else is treated
    /// as configuration-scoped and aborts the run.
    pub fn is_entity_scoped(&self) -> bool {
        matches!(
            self,
            EngineError::MissingMetric { .. }
                | EngineError::UnresolvedDependency { .. }
                | EngineError::UnresolvedReference { .. }
        )
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_not_found_displays_path() {
        let error = EngineError::PlanNotFound {
            path: "/missing/plan.yaml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Plan document not found: /missing/plan.yaml"
        );
    }

    #[test]
    fn test_plan_parse_error_displays_path_and_message() {
        let error = EngineError::PlanParseError {
            path: "/plans/bad.yaml".to_string(),
            message: "invalid YAML syntax".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse plan document '/plans/bad.yaml': invalid YAML syntax"
        );
    }

    #[test]
    fn test_configuration_error_displays_context() {
        let error = EngineError::ConfigurationError {
            context: "component 'sales_commission'".to_string(),
            message: "tier mode must be declared".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration in component 'sales_commission': tier mode must be declared"
        );
    }

    #[test]
    fn test_missing_metric_displays_entity_and_metric() {
        let error = EngineError::MissingMetric {
            entity_id: "emp_042".to_string(),
            metric: "net_sales".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Missing required metric 'net_sales' for entity 'emp_042'"
        );
    }

    #[test]
    fn test_unresolved_dependency_displays_both_names() {
        let error = EngineError::UnresolvedDependency {
            metric: "attach_rate".to_string(),
            reference: "units_sold".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Derivation of metric 'attach_rate' references unresolved metric 'units_sold'"
        );
    }

    #[test]
    fn test_unresolved_reference_displays_component_and_name() {
        let error = EngineError::UnresolvedReference {
            component: "kicker".to_string(),
            reference: "base_commission".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Formula component 'kicker' references unresolved name 'base_commission'"
        );
    }

    #[test]
    fn test_entity_scoped_classification() {
        assert!(
            EngineError::MissingMetric {
                entity_id: "e1".to_string(),
                metric: "m".to_string(),
            }
            .is_entity_scoped()
        );
        assert!(
            EngineError::UnresolvedDependency {
                metric: "m".to_string(),
                reference: "r".to_string(),
            }
            .is_entity_scoped()
        );
        assert!(
            EngineError::UnresolvedReference {
                component: "c".to_string(),
                reference: "r".to_string(),
            }
            .is_entity_scoped()
        );
        assert!(
            !EngineError::ConfigurationError {
                context: "c".to_string(),
                message: "m".to_string(),
            }
            .is_entity_scoped()
        );
        assert!(
            !EngineError::PlanNotFound {
                path: "p".to_string(),
            }
            .is_entity_scoped()
        );
    }

    #[test]
    fn test_errors_implement_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<EngineError>();
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn returns_plan_not_found() -> EngineResult<()> {
            Err(EngineError::PlanNotFound {
                path: "/test".to_string(),
            })
        }

        fn propagates_error() -> EngineResult<()> {
            returns_plan_not_found()?;
            Ok(())
        }

        assert!(propagates_error().is_err());
    }
}
