//! Time axis synthesis.
//!
//! Once the flux column is fixed, the time axis comes from the most
//! trustworthy source available:
//!
//! 1. a named time column, used as-is;
//! 2. a cadence-index column, converted to elapsed days at a fixed
//!    cadence duration;
//! 3. any other numeric column that is strictly increasing;
//! 4. the row index at that same fixed cadence.
//!
//! Rows missing a value in any of the columns involved are dropped.

use log::info;

use crate::columns::ColumnSelection;
use crate::lightcurve::{LightCurve, LightCurveError};
use crate::stats;
use crate::table::RawTable;

/// A synthesized time column needs more than this many values.
const MONOTONIC_MIN_VALUES: usize = 10;

/// Where the time axis of a light curve came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimeSource {
    Column(String),
    Cadence(String),
    Monotonic(String),
    RowIndex,
}

/// Build the light curve for the selected flux column.
///
/// `cadence_days` is the assumed sampling interval used by the cadence
/// and row-index strategies.  Fails when fewer than `min_points` complete
/// rows remain.
pub fn build_light_curve(
    table: &RawTable,
    selection: &ColumnSelection,
    cadence_days: f64,
    min_points: usize,
) -> Result<(LightCurve, TimeSource), LightCurveError> {
    let flux_col = selection.flux;
    let names = table.names();

    let (time, flux, source) = if let Some(t) = selection.time {
        let rows = table.complete_rows(&[t, flux_col]);
        (table.gather(t, &rows), table.gather(flux_col, &rows), TimeSource::Column(names[t].clone()))
    } else if let Some(c) = selection.cadence {
        let rows = table.complete_rows(&[c, flux_col]);
        let cadence = table.gather(c, &rows);
        let first = cadence.iter().copied().fold(f64::INFINITY, f64::min);
        let time = cadence.iter().map(|c| (c - first) * cadence_days).collect();
        (time, table.gather(flux_col, &rows), TimeSource::Cadence(names[c].clone()))
    } else if let Some(m) = find_monotonic_column(table, selection) {
        let rows = table.complete_rows(&[m, flux_col]);
        (table.gather(m, &rows), table.gather(flux_col, &rows), TimeSource::Monotonic(names[m].clone()))
    } else {
        let rows = table.complete_rows(&[flux_col]);
        let time = (0..rows.len()).map(|i| i as f64 * cadence_days).collect();
        (time, table.gather(flux_col, &rows), TimeSource::RowIndex)
    };

    if flux.len() < min_points.max(1) {
        return Err(LightCurveError::InsufficientData {
            stage: "column selection",
            points: flux.len(),
            required: min_points.max(1),
        });
    }

    let lc = LightCurve::new(time, flux)?;
    info!(
        "Time axis from {:?}: {} points, span {:.1} days",
        source,
        lc.len(),
        lc.baseline(),
    );
    Ok((lc, source))
}

/// First numeric column, other than flux and uncertainties, whose values
/// strictly increase.
fn find_monotonic_column(table: &RawTable, selection: &ColumnSelection) -> Option<usize> {
    (0..table.n_cols())
        .filter(|&j| j != selection.flux && !selection.errors.contains(&j) && table.is_numeric(j))
        .find(|&j| {
            let values = table.present_values(j);
            values.len() > MONOTONIC_MIN_VALUES && stats::is_strictly_increasing(&values)
        })
}
