//! End-to-end driver: text file in, [`PipelineResult`] out.
//!
//! ```text
//!  raw file ──► TableReader ──► classify ──► build_light_curve
//!                                                   │
//!      PipelineResult ◄── MultiSignalExtractor ◄── normalize
//! ```
//!
//! Every stage error is caught here and turned into
//! [`PipelineResult::Failure`]; nothing escapes as a panic or an `Err`.

use std::path::Path;

use log::{error, info};

use crate::columns::{classify, ColumnError};
use crate::extractor::MultiSignalExtractor;
use crate::lightcurve::{self, LightCurveError};
use crate::table::{RawTable, TableError, TableReader};
use crate::time_axis::build_light_curve;
use crate::types::{PipelineFailure, PipelineParams, PipelineReport, PipelineResult};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Any failure that ends a run without a report.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Columns(#[from] ColumnError),

    #[error(transparent)]
    LightCurve(#[from] LightCurveError),
}

impl PipelineError {
    /// Stable category name for callers that branch on the failure type.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Table(TableError::Io(_)) => "io_error",
            PipelineError::Table(_) => "parse_error",
            PipelineError::Columns(ColumnError::NoFluxColumn(_)) => "no_flux_column",
            PipelineError::LightCurve(LightCurveError::InvalidBaseline(_)) => "invalid_baseline",
            PipelineError::LightCurve(_) => "insufficient_data",
        }
    }
}

impl From<PipelineError> for PipelineResult {
    fn from(e: PipelineError) -> Self {
        PipelineResult::Failure(PipelineFailure {
            kind: e.kind(),
            error: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A configured transit search.  Holds no per-run state, so one instance
/// can analyze any number of files.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    params: PipelineParams,
}

impl Pipeline {
    pub fn new(params: PipelineParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Analyze the delimited text file at `path`.
    pub fn run_file<P: AsRef<Path>>(&self, path: P) -> PipelineResult {
        let path = path.as_ref();
        info!("Analyzing {}", path.display());
        let reader = TableReader::new(self.params.ingest.clone());
        Self::finish(reader.read(path).map_err(PipelineError::from).and_then(|t| self.try_run_table(&t)))
    }

    /// Analyze already-loaded file content.
    pub fn run_str(&self, content: &str) -> PipelineResult {
        let reader = TableReader::new(self.params.ingest.clone());
        Self::finish(reader.parse(content).map_err(PipelineError::from).and_then(|t| self.try_run_table(&t)))
    }

    /// Column selection through extraction for a parsed table.
    pub fn try_run_table(&self, table: &RawTable) -> Result<PipelineReport, PipelineError> {
        let p = &self.params;
        let selection = classify(table)?;
        let (mut lc, _source) = build_light_curve(table, &selection, p.cadence_days, p.min_usable_rows)?;

        lightcurve::normalize(&mut lc, &p.normalize)?;
        if lc.len() < p.min_usable_rows {
            return Err(LightCurveError::InsufficientData {
                stage: "outlier rejection",
                points: lc.len(),
                required: p.min_usable_rows,
            }
            .into());
        }

        let extractor = MultiSignalExtractor::new(p.search.clone(), p.extractor.clone());
        let extraction = extractor.extract(&lc);

        Ok(PipelineReport::new(
            extraction.signals,
            lc.len(),
            lc.mean_flux(),
            lc.std_flux(),
        ))
    }

    fn finish(outcome: Result<PipelineReport, PipelineError>) -> PipelineResult {
        match outcome {
            Ok(report) => {
                info!(
                    "Run complete: {} signal(s) in {} points",
                    report.num_planets, report.data_points,
                );
                PipelineResult::Success(report)
            }
            Err(e) => {
                error!("Run failed ({}): {}", e.kind(), e);
                e.into()
            }
        }
    }
}

/// Analyze `path` with default parameters.
pub fn analyze_file<P: AsRef<Path>>(path: P) -> PipelineResult {
    Pipeline::default().run_file(path)
}
