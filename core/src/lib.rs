//! # transitscan-core
//!
//! Transit-search library: finds periodic dimming in stellar light curves
//! stored as arbitrary delimited text, with optional Python bindings via
//! [PyO3](https://pyo3.rs).
//!
//! ## Overview
//!
//! | Module         | Purpose                                                   |
//! |----------------|-----------------------------------------------------------|
//! | [`table`]      | Delimiter-sniffing reader for unknown tabular files       |
//! | [`columns`]    | Picks the time, flux and cadence columns by name/behavior |
//! | [`time_axis`]  | Builds the time axis, synthesizing one if needed          |
//! | [`lightcurve`] | Light curve type, normalization and outlier rejection     |
//! | [`bls`]        | Box-least-squares periodogram over a period grid          |
//! | [`extractor`]  | Iterative detect-and-mask search for several planets      |
//! | [`pipeline`]   | File → [`PipelineResult`] driver                          |
//! | [`features`]   | Feature tuples for the disposition classifier             |
//! | [`types`]      | Shared records and parameter blocks                       |
//!
//! ## Rust usage
//!
//! ```no_run
//! use transitscan_core::{Pipeline, PipelineParams, PipelineResult};
//!
//! let pipeline = Pipeline::new(PipelineParams::default());
//! match pipeline.run_file("kepler_lightcurve.csv") {
//!     PipelineResult::Success(report) => {
//!         for planet in &report.signals {
//!             println!("P = {:.3} d, depth = {:.0} ppm", planet.orbital_period, planet.transit_depth);
//!         }
//!     }
//!     PipelineResult::Failure(f) => eprintln!("{}: {}", f.kind, f.error),
//! }
//! ```
//!
//! ## Python usage
//!
//! Built with the `python` feature, the library exposes a module called
//! `transitscan_core`:
//!
//! ```python
//! import json, transitscan_core
//!
//! result = json.loads(transitscan_core.analyze_file("lightcurve.csv"))
//! print(result["num_planets"])
//! ```

pub mod bls;
pub mod columns;
pub mod extractor;
pub mod features;
pub mod lightcurve;
pub mod pipeline;
pub mod stats;
pub mod table;
pub mod time_axis;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use bls::BlsEngine;
pub use extractor::{Extraction, LoopState, MultiSignalExtractor};
pub use features::{Survey, TransitFeatures};
pub use lightcurve::LightCurve;
pub use pipeline::{analyze_file, Pipeline, PipelineError};
pub use table::{RawTable, TableReader};
pub use types::{
    DetectedSignal, ExtractorParams, PeriodogramResult, PipelineParams, PipelineReport, PipelineResult,
    SearchParams,
};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Run the full pipeline on `path` and return the result as JSON.
///
/// `config` is an optional JSON object overriding [`PipelineParams`]
/// fields.
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "analyze_file", signature = (path, config=None))]
fn py_analyze_file(path: &str, config: Option<&str>) -> PyResult<String> {
    let params = match config {
        Some(text) => serde_json::from_str::<PipelineParams>(text)
            .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?,
        None => PipelineParams::default(),
    };
    let result = Pipeline::new(params).run_file(path);
    serde_json::to_string(&result).map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))
}

/// The top-level Python module exposed by this crate.
///
/// Registered items:
/// - `analyze_file`: full pipeline, JSON in/out
/// - `DetectedSignal`: one accepted transit signal
/// - `SearchParams`: BLS search configuration
/// - `ExtractorParams`: extraction loop configuration
/// - `PipelineReport`: aggregated run output
#[cfg(feature = "python")]
#[pymodule]
fn transitscan_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_analyze_file, m)?)?;
    m.add_class::<DetectedSignal>()?;
    m.add_class::<SearchParams>()?;
    m.add_class::<ExtractorParams>()?;
    m.add_class::<PipelineReport>()?;

    // Module-level metadata
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("__doc__", "Transit search over stellar light curves.")?;

    Ok(())
}
