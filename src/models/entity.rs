//! Entity model.
//!
//! An entity is a payout subject (employee, store, rep) scoped to a tenant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Represents a payout subject scoped to a tenant.
///
/// The `id` is the identity key used for cross-period continuity and for
/// joining result sets during reconciliation. `attributes` carries free-form
/// entity facts; segment keys used for segment-level reconciliation (e.g.
/// `store`, `team`) and eligibility attributes (e.g. `certified`) live here.
///
/// # Example
///
/// ```
/// use payout_engine::models::Entity;
/// use std::collections::BTreeMap;
///
/// let entity = Entity {
///     id: "rep_001".to_string(),
///     tenant_id: "acme".to_string(),
///     attributes: BTreeMap::from([("store".to_string(), "north".to_string())]),
/// };
/// assert_eq!(entity.attribute("store"), Some("north"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for the entity within the tenant.
    pub id: String,
    /// The tenant this entity belongs to.
    pub tenant_id: String,
    /// Free-form attributes (segment keys, eligibility flags).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Entity {
    /// Looks up an attribute value by key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
