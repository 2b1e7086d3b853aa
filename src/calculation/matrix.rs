//! Two-axis matrix component calculation.
//!
//! Two independent metrics are banded independently against declared row and
//! column band lists; the payout is read from the cell at the intersection of
//! the matched bands. A value falling outside all declared bands on either
//! axis yields a zero payout with a trace naming the uncovered axis — which
//! is distinguishable from a genuine zero-rate cell.

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::models::{Band, ComponentTrace, MatrixConfig, MetricMap};

use super::{ComponentOutcome, round_payout};

fn band_index(bands: &[Band], value: Decimal) -> Option<usize> {
    bands.iter().position(|band| band.contains(value))
}

/// Calculates a matrix component payout.
///
/// # Errors
///
/// Returns `ConfigurationError` when the cell grid does not match the band
/// list dimensions (load-time validation normally rejects this first).
pub fn calculate_matrix(
    component_name: &str,
    config: &MatrixConfig,
    metrics: &MetricMap,
) -> EngineResult<ComponentOutcome> {
    if config.cells.len() != config.row_bands.len()
        || config
            .cells
            .iter()
            .any(|row| row.len() != config.column_bands.len())
    {
        return Err(EngineError::ConfigurationError {
            context: format!("component '{component_name}'"),
            message: format!(
                "cell grid must be {} rows × {} columns",
                config.row_bands.len(),
                config.column_bands.len()
            ),
        });
    }

    let row_value = metrics
        .get(&config.row_metric)
        .copied()
        .unwrap_or(Decimal::ZERO);
    let column_value = metrics
        .get(&config.column_metric)
        .copied()
        .unwrap_or(Decimal::ZERO);

    let input = serde_json::json!({
        "row_metric": config.row_metric,
        "row_value": row_value.normalize().to_string(),
        "column_metric": config.column_metric,
        "column_value": column_value.normalize().to_string(),
    });

    let row_index = band_index(&config.row_bands, row_value);
    let column_index = band_index(&config.column_bands, column_value);

    let (Some(row), Some(column)) = (row_index, column_index) else {
        let mut uncovered = Vec::new();
        if row_index.is_none() {
            uncovered.push("row");
        }
        if column_index.is_none() {
            uncovered.push("column");
        }
        return Ok(ComponentOutcome {
            payout: Decimal::ZERO,
            trace: ComponentTrace {
                input,
                output: serde_json::json!({
                    "payout": "0",
                    "uncovered_axes": uncovered,
                }),
                reasoning: format!(
                    "No band coverage on {} axis; no payout",
                    uncovered.join(" and ")
                ),
            },
        });
    };

    let payout = round_payout(config.cells[row][column]);
    Ok(ComponentOutcome {
        payout,
        trace: ComponentTrace {
            input,
            output: serde_json::json!({
                "row_band": row,
                "column_band": column,
                "payout": payout.normalize().to_string(),
            }),
            reasoning: format!(
                "Matrix cell (row {}, column {}) matched: {} = {}, {} = {} pays {}",
                row,
                column,
                config.row_metric,
                row_value.normalize(),
                config.column_metric,
                column_value.normalize(),
                payout.normalize()
            ),
        },
    })
}
