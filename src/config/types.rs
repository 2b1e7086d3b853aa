//! Engine settings types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tolerance for payout comparisons during reconciliation.
///
/// A delta is within tolerance when its absolute value is at most
/// `absolute`, or when its percentage of the expected value is at most
/// `relative_pct`.
///
/// # Example
///
/// ```
/// use payout_engine::config::Tolerance;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let tolerance = Tolerance::default(); // 0 absolute / 0.5% relative
/// let expected = Decimal::from_str("1000.00").unwrap();
/// assert!(tolerance.within(expected, Decimal::from_str("1004.00").unwrap()));
/// assert!(!tolerance.within(expected, Decimal::from_str("1010.00").unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Maximum acceptable absolute delta.
    pub absolute: Decimal,
    /// Maximum acceptable delta as a percentage of the expected value.
    pub relative_pct: Decimal,
}

impl Default for Tolerance {
    /// 0 absolute / 0.5% relative.
    fn default() -> Self {
        Self {
            absolute: Decimal::ZERO,
            relative_pct: Decimal::new(5, 1),
        }
    }
}

impl Tolerance {
    /// An exact tolerance: only identical values compare as matching.
    pub fn exact() -> Self {
        Self {
            absolute: Decimal::ZERO,
            relative_pct: Decimal::ZERO,
        }
    }

    /// Returns the delta of `actual` against `expected` as a percentage of
    /// the expected value, or `None` when the expected value is zero.
    pub fn delta_pct(expected: Decimal, actual: Decimal) -> Option<Decimal> {
        if expected.is_zero() {
            None
        } else {
            Some((actual - expected) / expected.abs() * Decimal::ONE_HUNDRED)
        }
    }

    /// Returns true if `actual` is within tolerance of `expected`.
    pub fn within(&self, expected: Decimal, actual: Decimal) -> bool {
        let delta = (actual - expected).abs();
        if delta <= self.absolute {
            return true;
        }
        match Self::delta_pct(expected, actual) {
            Some(pct) => pct.abs() <= self.relative_pct,
            None => false,
        }
    }
}

/// Configuration surface for the engine.
///
/// All fields have documented defaults so collaborators can supply only what
/// they need to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Reconciliation tolerance (default: 0 absolute / 0.5% relative).
    pub tolerance: Tolerance,
    /// The sum of absolute per-entity deltas above which a matching
    /// aggregate is flagged as false-green (default: 0.01, one cent).
    pub false_green_threshold: Decimal,
    /// Maximum concurrently calculated entities; `None` means unbounded
    /// (capped only by collaborator-imposed limits).
    pub concurrency: Option<usize>,
    /// The entity attribute used to group segment subtotals during
    /// reconciliation; `None` skips the segment layer.
    pub segment_key: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            false_green_threshold: Decimal::new(1, 2),
            concurrency: None,
            segment_key: None,
        }
    }
}
