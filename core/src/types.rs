//! Common types shared across the transit-search pipeline.
//!
//! These structures represent the fundamental data objects of a
//! periodic-dimming search: the per-stage parameter blocks, the
//! periodogram of one search pass, the immutable record of an accepted
//! transit signal, and the single result value handed back to callers.

#[cfg(feature = "python")]
use pyo3::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DetectedSignal
// ---------------------------------------------------------------------------

/// A periodic transit signal accepted by the multi-signal extractor.
///
/// Once appended to the output list a signal is never mutated.  The wire
/// names (`transit_time`, `snr`, ...) are the ones downstream consumers
/// already key on, so they differ from the Rust field names.
#[cfg_attr(feature = "python", pyclass(get_all, frozen))]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedSignal {
    /// Best-fit orbital period, in days.
    pub orbital_period: f64,

    /// Transit centre nearest the start of the working light curve, in the
    /// same units as the input time axis.  May precede the first timestamp
    /// when the data begins mid-transit.
    #[serde(rename = "transit_time")]
    pub transit_epoch: f64,

    /// Fractional brightness drop expressed in parts-per-million.
    pub transit_depth: f64,

    /// Periodogram signal-to-noise: `(max − median) / std` of the power
    /// curve on the iteration that found this signal.
    #[serde(rename = "snr")]
    pub signal_to_noise: f64,

    /// Transit duration estimate in hours (fixed fraction of the period).
    #[serde(rename = "transit_duration")]
    pub estimated_transit_duration: f64,

    /// Planet radius estimate in Earth radii, from `sqrt(depth)` scaled by
    /// the assumed stellar radius.
    #[serde(rename = "planetary_radius")]
    pub estimated_radius: f64,
}

#[cfg(feature = "python")]
#[pymethods]
impl DetectedSignal {
    fn __repr__(&self) -> String {
        format!(
            "DetectedSignal(period={:.4} d, epoch={:.4}, depth={:.1} ppm, SNR={:.2}, radius={:.2} R⊕)",
            self.orbital_period,
            self.transit_epoch,
            self.transit_depth,
            self.signal_to_noise,
            self.estimated_radius,
        )
    }
}

// ---------------------------------------------------------------------------
// PeriodogramResult
// ---------------------------------------------------------------------------

/// Output of one box-least-squares pass over a period grid.
///
/// `periods` and `power` are parallel sequences in grid order.  The
/// remaining fields describe the box that produced the global maximum.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodogramResult {
    pub periods: Vec<f64>,
    pub power: Vec<f64>,
    pub best_period: f64,
    /// Transit centre nearest the curve's first timestamp.
    pub best_epoch: f64,
    /// Fractional depth of the best box relative to the out-of-transit level.
    pub best_depth: f64,
    /// Width of the best box, in days.
    pub best_duration: f64,
    /// Number of points that fell inside the best box.
    pub best_in_transit: usize,
}

impl PeriodogramResult {
    /// Maximum value of the power curve.
    pub fn max_power(&self) -> f64 {
        self.power.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// How the tabular ingestor tries to split an unknown text file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestParams {
    /// Field delimiters, tried in order.  The first one yielding a usable
    /// table wins.
    pub delimiters: Vec<char>,
    /// Lines starting with this character are skipped.
    pub comment: char,
    /// A table needs at least this many columns ...
    pub min_columns: usize,
    /// ... and strictly more than this many data rows.
    pub min_rows: usize,
}

impl Default for IngestParams {
    fn default() -> Self {
        Self {
            delimiters: vec![',', '\t', ';', '|', ' '],
            comment: '#',
            min_columns: 2,
            min_rows: 10,
        }
    }
}

/// Normalization and outlier rejection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeParams {
    /// Points further than this many standard deviations from the median
    /// are dropped.  Kept wide so genuine transit dips survive.
    pub outlier_sigma: f64,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self { outlier_sigma: 10.0 }
    }
}

/// Configuration for the box-least-squares period search.
///
/// The grid bounds follow the baseline of the data: long baselines (more
/// than `long_baseline_days`) search up to a third of the baseline so at
/// least `min_transits` transits are observable, short ones use the fixed
/// short-period window.
#[cfg_attr(feature = "python", pyclass(get_all, set_all))]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Lower bound of every period grid, in days.
    pub min_period: f64,
    /// Upper bound for short-baseline data, in days.
    pub short_max_period: f64,
    /// Baselines longer than this switch to the long-period grid.
    pub long_baseline_days: f64,
    /// Hard cap on the long-period grid's upper bound, in days.
    pub long_max_period_cap: f64,
    /// Minimum number of transits the longest searched period must allow.
    pub min_transits: f64,
    pub short_grid_points: usize,
    pub long_grid_points: usize,
    /// Trial box widths, in days.
    pub durations: Vec<f64>,
    /// Phase bins per shortest trial duration.
    pub oversample: usize,
    /// Upper limit on phase bins for a single period.
    pub max_bins: usize,
    /// Number of rayon worker threads.  Set to 0 to use all cores.
    pub n_workers: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            min_period: 0.5,
            short_max_period: 50.0,
            long_baseline_days: 300.0,
            long_max_period_cap: 500.0,
            min_transits: 3.0,
            short_grid_points: 5000,
            long_grid_points: 8000,
            durations: vec![0.05, 0.10, 0.15, 0.20, 0.25, 0.33],
            oversample: 5,
            max_bins: 2500,
            n_workers: 0,
        }
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl SearchParams {
    #[new]
    fn py_new() -> Self {
        Self::default()
    }

    fn __repr__(&self) -> String {
        format!(
            "SearchParams(periods={:.2}..{:.2} d, grid={}/{}, durations={:?})",
            self.min_period,
            self.short_max_period,
            self.short_grid_points,
            self.long_grid_points,
            self.durations,
        )
    }
}

/// Acceptance, derivation and masking constants for the extraction loop.
///
/// The threshold schedule and mask width are empirical defaults; they are
/// kept configurable so other surveys can substitute their own.
#[cfg_attr(feature = "python", pyclass(get_all, set_all))]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorParams {
    /// Hard upper bound on accepted signals per run.
    pub max_signals: usize,
    /// Periodogram SNR threshold for the first iteration.
    pub base_snr_threshold: f64,
    /// Added to the threshold for every further iteration.
    pub snr_step: f64,
    /// Points with `|phase| < mask_half_phase` are removed after a
    /// detection.
    pub mask_half_phase: f64,
    /// Stop once fewer points than this remain in the working curve.
    pub min_remaining_points: usize,
    /// Minimum significance of the best box itself, in units of the flux
    /// scatter.  0 disables the check.
    pub min_depth_snr: f64,
    /// Transit duration estimate as a fraction of the period.
    pub duration_fraction: f64,
    /// Stellar radius in Earth radii used to turn depth into planet size.
    pub stellar_radius_earth: f64,
}

impl Default for ExtractorParams {
    fn default() -> Self {
        Self {
            max_signals: 10,
            base_snr_threshold: 2.5,
            snr_step: 0.5,
            mask_half_phase: 0.1,
            min_remaining_points: 100,
            min_depth_snr: 7.0,
            duration_fraction: 0.1,
            stellar_radius_earth: 109.0,
        }
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl ExtractorParams {
    #[new]
    fn py_new() -> Self {
        Self::default()
    }

    fn __repr__(&self) -> String {
        format!(
            "ExtractorParams(max_signals={}, snr={:.1}+{:.1}·i, mask=±{:.2})",
            self.max_signals, self.base_snr_threshold, self.snr_step, self.mask_half_phase,
        )
    }
}

impl ExtractorParams {
    /// Periodogram SNR a candidate must reach on iteration `iteration`
    /// (zero-based).
    pub fn snr_threshold(&self, iteration: usize) -> f64 {
        self.base_snr_threshold + self.snr_step * iteration as f64
    }
}

/// Top-level configuration, one block per pipeline stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    /// Sampling interval assumed when the time axis has to be synthesized,
    /// in days (29.4 minute long cadence).
    pub cadence_days: f64,
    /// Fewer usable rows than this at any stage is an error.
    pub min_usable_rows: usize,
    pub ingest: IngestParams,
    pub normalize: NormalizeParams,
    pub search: SearchParams,
    pub extractor: ExtractorParams,
}

impl PipelineParams {
    pub const LONG_CADENCE_DAYS: f64 = 0.0204;
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            cadence_days: Self::LONG_CADENCE_DAYS,
            min_usable_rows: 10,
            ingest: IngestParams::default(),
            normalize: NormalizeParams::default(),
            search: SearchParams::default(),
            extractor: ExtractorParams::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineResult
// ---------------------------------------------------------------------------

/// Successful analysis of one light-curve file.
#[cfg_attr(feature = "python", pyclass(get_all))]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineReport {
    pub detected: bool,
    pub num_planets: usize,
    /// Signals in detection order; the strongest comes first.
    #[serde(rename = "planets")]
    pub signals: Vec<DetectedSignal>,
    /// Points in the normalized, outlier-cleaned light curve.
    pub data_points: usize,
    pub mean_flux: f64,
    pub std_flux: f64,
    /// The first signal repeated at the top level for older consumers.
    #[serde(flatten)]
    pub first: Option<DetectedSignal>,
}

impl PipelineReport {
    pub fn new(signals: Vec<DetectedSignal>, data_points: usize, mean_flux: f64, std_flux: f64) -> Self {
        Self {
            detected: !signals.is_empty(),
            num_planets: signals.len(),
            first: signals.first().cloned(),
            signals,
            data_points,
            mean_flux,
            std_flux,
        }
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl PipelineReport {
    /// Serialise the report to a JSON string.
    pub fn to_json(&self) -> PyResult<String> {
        serde_json::to_string(self).map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))
    }

    fn __repr__(&self) -> String {
        format!(
            "PipelineReport(detected={}, planets={}, points={})",
            self.detected, self.num_planets, self.data_points,
        )
    }
}

/// The error record returned instead of a report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineFailure {
    pub error: String,
    pub kind: &'static str,
}

/// The single externally visible artifact of a pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PipelineResult {
    Success(PipelineReport),
    Failure(PipelineFailure),
}

impl PipelineResult {
    pub fn report(&self) -> Option<&PipelineReport> {
        match self {
            PipelineResult::Success(report) => Some(report),
            PipelineResult::Failure(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(period: f64) -> DetectedSignal {
        DetectedSignal {
            orbital_period: period,
            transit_epoch: 1.25,
            transit_depth: 900.0,
            signal_to_noise: 12.0,
            estimated_transit_duration: 0.1 * period * 24.0,
            estimated_radius: 0.03 * 109.0,
        }
    }

    #[test]
    fn threshold_increases_each_iteration() {
        let params = ExtractorParams::default();
        assert_eq!(params.snr_threshold(0), 2.5);
        assert_eq!(params.snr_threshold(1), 3.0);
        assert_eq!(params.snr_threshold(4), 4.5);
    }

    #[test]
    fn report_flattens_first_signal() {
        let report = PipelineReport::new(vec![signal(3.5), signal(7.0)], 1200, 1.0, 0.001);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["detected"], true);
        assert_eq!(json["num_planets"], 2);
        assert_eq!(json["planets"].as_array().unwrap().len(), 2);
        assert_eq!(json["orbital_period"], 3.5);
        assert_eq!(json["planets"][1]["transit_time"], 1.25);
        assert!(json.get("first").is_none());
    }

    #[test]
    fn empty_report_has_no_top_level_signal() {
        let report = PipelineReport::new(Vec::new(), 50, 1.0, 0.0);
        let json = serde_json::to_value(PipelineResult::Success(report)).unwrap();

        assert_eq!(json["detected"], false);
        assert_eq!(json["num_planets"], 0);
        assert!(json.get("orbital_period").is_none());
    }

    #[test]
    fn failure_serializes_error_and_kind() {
        let result = PipelineResult::Failure(PipelineFailure {
            error: "no usable table".into(),
            kind: "parse_error",
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"error": "no usable table", "kind": "parse_error"}));
        assert!(!result.is_success());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let params: PipelineParams =
            serde_json::from_str(r#"{"extractor": {"max_signals": 3}, "search": {"n_workers": 2}}"#).unwrap();
        assert_eq!(params.extractor.max_signals, 3);
        assert_eq!(params.extractor.mask_half_phase, 0.1);
        assert_eq!(params.search.n_workers, 2);
        assert_eq!(params.search.short_grid_points, 5000);
        assert_eq!(params.cadence_days, 0.0204);
    }
}
