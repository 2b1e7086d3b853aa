//! Period model.
//!
//! Calculations are always scoped to a tenant-defined period: a date range
//! with a canonical key (e.g. `2026-Q1`, `2026-01`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Represents a tenant-scoped calculation period.
///
/// # Example
///
/// ```
/// use payout_engine::models::Period;
/// use chrono::NaiveDate;
///
/// let period = Period {
///     key: "2026-01".to_string(),
///     tenant_id: "acme".to_string(),
///     start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
///     end_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
/// };
/// assert!(period.validate().is_ok());
/// assert!(period.contains_date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Canonical key for the period, unique within the tenant.
    pub key: String,
    /// The tenant this period belongs to.
    pub tenant_id: String,
    /// First day of the period (inclusive).
    pub start_date: NaiveDate,
    /// Last day of the period (inclusive).
    pub end_date: NaiveDate,
}

impl Period {
    /// Validates that the period bounds are consistent.
    pub fn validate(&self) -> EngineResult<()> {
        if self.start_date > self.end_date {
            return Err(EngineError::InvalidPeriod {
                key: self.key.clone(),
                message: format!(
                    "start_date {} is after end_date {}",
                    self.start_date, self.end_date
                ),
            });
        }
        Ok(())
    }

    /// Returns true if the given date falls within the period (inclusive).
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}
