//! Variant selection.
//!
//! Chooses which plan variant applies to an entity for a period. Selection
//! is first-match, not best-match: variants are evaluated in ascending
//! persisted ordinal order and the first whose eligibility predicate matches
//! wins. `NoMatch` is a first-class result, not an error — the caller
//! decides whether to surface it as "excluded" or "misconfigured".

use crate::models::{Entity, MetricMap, RuleSet, Variant};

/// The outcome of variant selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<'a> {
    /// The first variant whose eligibility predicate matched.
    Selected(&'a Variant),
    /// No variant's predicate matched; the entity produces no result for
    /// this rule set (not a zero-payout result).
    NoMatch,
}

/// Selects the applicable variant for an entity.
///
/// Deterministic: given identical (entity, metrics), repeated selection
/// returns the same variant every time, because evaluation order is the
/// persisted ordinal order and predicates are pure.
///
/// # Example
///
/// ```
/// use payout_engine::models::{EligibilityRule, Entity, MetricMap, PlanStatus, RuleSet, Variant};
/// use payout_engine::selector::{Selection, select};
/// use std::collections::BTreeMap;
///
/// let rule_set = RuleSet {
///     id: "plan_1".to_string(),
///     tenant_id: "acme".to_string(),
///     name: "Sales Plan".to_string(),
///     version: 1,
///     status: PlanStatus::Active,
///     input_bindings: vec![],
///     derivations: vec![],
///     variants: vec![Variant {
///         name: "standard".to_string(),
///         ordinal: 1,
///         eligibility: EligibilityRule::Always,
///         components: vec![],
///     }],
/// };
/// let entity = Entity {
///     id: "rep_001".to_string(),
///     tenant_id: "acme".to_string(),
///     attributes: BTreeMap::new(),
/// };
///
/// match select(&rule_set, &entity, &MetricMap::new()) {
///     Selection::Selected(variant) => assert_eq!(variant.name, "standard"),
///     Selection::NoMatch => panic!("expected a match"),
/// }
/// ```
pub fn select<'a>(rule_set: &'a RuleSet, entity: &Entity, metrics: &MetricMap) -> Selection<'a> {
    for variant in rule_set.ordered_variants() {
        if variant.eligibility.matches(entity, metrics) {
            return Selection::Selected(variant);
        }
    }
    Selection::NoMatch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EligibilityRule, PlanStatus};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn variant(name: &str, ordinal: u32, eligibility: EligibilityRule) -> Variant {
        Variant {
            name: name.to_string(),
            ordinal,
            eligibility,
            components: vec![],
        }
    }

    fn rule_set(variants: Vec<Variant>) -> RuleSet {
        RuleSet {
            id: "plan_1".to_string(),
            tenant_id: "acme".to_string(),
            name: "Sales Plan".to_string(),
            version: 1,
            status: PlanStatus::Active,
            input_bindings: vec![],
            derivations: vec![],
            variants,
        }
    }

    fn entity(attrs: &[(&str, &str)]) -> Entity {
        Entity {
            id: "rep_001".to_string(),
            tenant_id: "acme".to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    // ==========================================================================
    // SEL-001: first match wins, in persisted ordinal order
    // ==========================================================================
    #[test]
    fn test_sel_001_first_match_by_ordinal() {
        // Declared out of order; ordinals say "certified" is evaluated first.
        let rule_set = rule_set(vec![
            variant("fallback", 2, EligibilityRule::Always),
            variant(
                "certified",
                1,
                EligibilityRule::AttributeEquals {
                    key: "certified".to_string(),
                    value: "yes".to_string(),
                },
            ),
        ]);
        let entity = entity(&[("certified", "yes")]);

        match select(&rule_set, &entity, &MetricMap::new()) {
            Selection::Selected(v) => assert_eq!(v.name, "certified"),
            Selection::NoMatch => panic!("expected a match"),
        }
    }

    // ==========================================================================
    // SEL-002: entities matching a later variant fall through to it
    // ==========================================================================
    #[test]
    fn test_sel_002_fallthrough_to_later_variant() {
        let rule_set = rule_set(vec![
            variant(
                "certified",
                1,
                EligibilityRule::AttributeEquals {
                    key: "certified".to_string(),
                    value: "yes".to_string(),
                },
            ),
            variant("fallback", 2, EligibilityRule::Always),
        ]);
        let entity = entity(&[("certified", "no")]);

        match select(&rule_set, &entity, &MetricMap::new()) {
            Selection::Selected(v) => assert_eq!(v.name, "fallback"),
            Selection::NoMatch => panic!("expected a match"),
        }
    }

    // ==========================================================================
    // SEL-003: no match is a first-class outcome
    // ==========================================================================
    #[test]
    fn test_sel_003_no_match() {
        let rule_set = rule_set(vec![variant(
            "certified",
            1,
            EligibilityRule::AttributeEquals {
                key: "certified".to_string(),
                value: "yes".to_string(),
            },
        )]);
        let entity = entity(&[]);

        assert_eq!(
            select(&rule_set, &entity, &MetricMap::new()),
            Selection::NoMatch
        );
    }

    // ==========================================================================
    // SEL-004: selection is deterministic across repeated calls
    // ==========================================================================
    #[test]
    fn test_sel_004_deterministic() {
        let rule_set = rule_set(vec![
            variant(
                "high_volume",
                1,
                EligibilityRule::MetricAtLeast {
                    metric: "units".to_string(),
                    value: dec("100"),
                },
            ),
            variant("standard", 2, EligibilityRule::Always),
        ]);
        let entity = entity(&[]);
        let metrics = BTreeMap::from([("units".to_string(), dec("150"))]);

        for _ in 0..10 {
            match select(&rule_set, &entity, &metrics) {
                Selection::Selected(v) => assert_eq!(v.name, "high_volume"),
                Selection::NoMatch => panic!("expected a match"),
            }
        }
    }

    #[test]
    fn test_empty_rule_set_is_no_match() {
        let rule_set = rule_set(vec![]);
        assert_eq!(
            select(&rule_set, &entity(&[]), &MetricMap::new()),
            Selection::NoMatch
        );
    }
}
