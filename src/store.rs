//! Storage ports for plans, committed facts and batches.
//!
//! The engine core is persistence-agnostic: it consumes these traits and
//! ships [`MemoryStore`], an in-memory implementation used by tests and
//! demos. Published rule sets are append-only — a (rule set id, version)
//! pair can be written once and never overwritten, so recalculations and
//! reconciliations can always name the exact plan they ran against.

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{CalculationBatch, Entity, RawRow, RuleSet};

/// Read/write access to versioned rule sets.
pub trait PlanStore {
    /// Stores a rule set version. Versions are append-only: writing an
    /// already-stored (id, version) pair is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RuleSetImmutable`] when the version already
    /// exists.
    fn put_rule_set(&mut self, rule_set: RuleSet) -> EngineResult<()>;

    /// Fetches a specific rule set version.
    fn rule_set(&self, id: &str, version: u32) -> Option<&RuleSet>;

    /// Fetches the highest stored version of a rule set.
    fn latest_rule_set(&self, id: &str) -> Option<&RuleSet>;
}

/// Read access to committed calculation inputs.
pub trait FactStore {
    /// The committed raw rows for (tenant, period).
    fn rows(&self, tenant_id: &str, period_key: &str) -> Vec<RawRow>;

    /// The entities belonging to a tenant.
    fn entities(&self, tenant_id: &str) -> Vec<Entity>;
}

/// Read/write access to immutable calculation batches.
pub trait BatchStore {
    /// Stores a batch under its own id.
    fn put_batch(&mut self, batch: CalculationBatch);

    /// Fetches a batch by id.
    fn batch(&self, id: Uuid) -> Option<&CalculationBatch>;

    /// Fetches both sides of a reconciliation in one read; `None` if either
    /// is absent.
    fn batch_pair(
        &self,
        left: Uuid,
        right: Uuid,
    ) -> Option<(&CalculationBatch, &CalculationBatch)>;
}

/// In-memory store backing tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rule_sets: BTreeMap<(String, u32), RuleSet>,
    rows: BTreeMap<(String, String), Vec<RawRow>>,
    entities: BTreeMap<String, Vec<Entity>>,
    batches: BTreeMap<Uuid, CalculationBatch>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits raw rows for (tenant, period), appending to any already
    /// committed for that key.
    pub fn put_rows(&mut self, tenant_id: &str, period_key: &str, rows: Vec<RawRow>) {
        self.rows
            .entry((tenant_id.to_string(), period_key.to_string()))
            .or_default()
            .extend(rows);
    }

    /// Registers entities for a tenant.
    pub fn put_entities(&mut self, tenant_id: &str, entities: Vec<Entity>) {
        self.entities
            .entry(tenant_id.to_string())
            .or_default()
            .extend(entities);
    }
}

impl PlanStore for MemoryStore {
    fn put_rule_set(&mut self, rule_set: RuleSet) -> EngineResult<()> {
        let key = (rule_set.id.clone(), rule_set.version);
        if self.rule_sets.contains_key(&key) {
            return Err(EngineError::RuleSetImmutable {
                rule_set_id: key.0,
                version: key.1,
            });
        }
        self.rule_sets.insert(key, rule_set);
        Ok(())
    }

    fn rule_set(&self, id: &str, version: u32) -> Option<&RuleSet> {
        self.rule_sets.get(&(id.to_string(), version))
    }

    fn latest_rule_set(&self, id: &str) -> Option<&RuleSet> {
        self.rule_sets
            .range((id.to_string(), 0)..=(id.to_string(), u32::MAX))
            .next_back()
            .map(|(_, rule_set)| rule_set)
    }
}

impl FactStore for MemoryStore {
    fn rows(&self, tenant_id: &str, period_key: &str) -> Vec<RawRow> {
        self.rows
            .get(&(tenant_id.to_string(), period_key.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn entities(&self, tenant_id: &str) -> Vec<Entity> {
        self.entities.get(tenant_id).cloned().unwrap_or_default()
    }
}

impl BatchStore for MemoryStore {
    fn put_batch(&mut self, batch: CalculationBatch) {
        self.batches.insert(batch.batch_id, batch);
    }

    fn batch(&self, id: Uuid) -> Option<&CalculationBatch> {
        self.batches.get(&id)
    }

    fn batch_pair(
        &self,
        left: Uuid,
        right: Uuid,
    ) -> Option<(&CalculationBatch, &CalculationBatch)> {
        Some((self.batches.get(&left)?, self.batches.get(&right)?))
    }
}
