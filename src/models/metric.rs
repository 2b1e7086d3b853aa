//! Committed metric data models.
//!
//! Raw committed rows are the canonicalized import output supplied by the
//! external data pipeline; the metric resolver turns them into a flat map of
//! named numeric metrics per entity per period.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A flat map of resolved metric name to numeric value for one entity.
///
/// `BTreeMap` is used so iteration order (and therefore trace and report
/// output) is deterministic.
pub type MetricMap = BTreeMap<String, Decimal>;

/// One committed raw data row for an entity.
///
/// Field values are kept as strings at this boundary; numeric coercion
/// happens in the metric resolver according to the plan's input bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// The entity this row belongs to.
    pub entity_id: String,
    /// Raw field name to raw value.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl RawRow {
    /// Creates a row from an entity id and (field, value) pairs.
    pub fn new<I, K, V>(entity_id: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entity_id: entity_id.to_string(),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A fully-resolved (entity, period, metric) numeric fact.
///
/// This is the persisted form of one resolved metric, used when resolved
/// metrics are stored or exchanged with collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFact {
    /// The entity the fact belongs to.
    pub entity_id: String,
    /// The period key the fact is scoped to.
    pub period_key: String,
    /// The canonical metric name.
    pub metric: String,
    /// The resolved numeric value.
    pub value: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_raw_row_builder() {
        let row = RawRow::new("rep_001", [("sales", "1200.50"), ("units", "14")]);
        assert_eq!(row.entity_id, "rep_001");
        assert_eq!(row.fields.get("sales").map(String::as_str), Some("1200.50"));
        assert_eq!(row.fields.get("units").map(String::as_str), Some("14"));
    }

    #[test]
    fn test_raw_row_deserialization_defaults_fields() {
        let json = r#"{ "entity_id": "rep_002" }"#;
        let row: RawRow = serde_json::from_str(json).unwrap();
        assert!(row.fields.is_empty());
    }

    #[test]
    fn test_metric_fact_serialization() {
        let fact = MetricFact {
            entity_id: "rep_001".to_string(),
            period_key: "2026-01".to_string(),
            metric: "net_sales".to_string(),
            value: Decimal::from_str("1234.56").unwrap(),
        };
        let json = serde_json::to_string(&fact).unwrap();
        assert!(json.contains("\"metric\":\"net_sales\""));
        assert!(json.contains("\"value\":\"1234.56\""));
    }
}
