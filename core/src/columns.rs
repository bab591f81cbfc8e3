//! Column classification: which columns of an arbitrary table hold time
//! and brightness.
//!
//! Archive exports name their columns in wildly different ways
//! (`TIME`, `BJD_TDB`, `PDCSAP_FLUX`, `rel_intensity`, `mag`, ...).  The
//! classifier runs every column name through an ordered chain of
//! [`ColumnRule`]s.  Each rule is a case-insensitive name predicate that
//! feeds one [`Slot`] with an explicit precedence; for every slot the
//! highest-precedence match wins and ties go to the column seen first.
//!
//! When no column looks like flux by name, a numeric fallback picks the
//! most variable non-monotonic column (see [`classify`]).

use std::cmp::Ordering;

use log::{debug, info};

use crate::stats;
use crate::table::RawTable;

// ---------------------------------------------------------------------------
// Keywords and precedence
// ---------------------------------------------------------------------------

const ERROR_KEYWORDS: &[&str] = &["error", "err", "uncertainty", "sigma"];
const DATE_KEYWORDS: &[&str] = &["bjd", "jd", "hjd", "mjd", "date", "epoch"];
const CADENCE_KEYWORDS: &[&str] = &["cadence", "frame", "index"];
const FLUX_KEYWORDS: &[&str] = &[
    "flux", "intensity", "mag", "brightness", "count", "signal", "adu", "electron",
];
/// Background, quality flags, pointing corrections and centroids carry
/// flux-like names but are never the brightness series.
const FLUX_EXCLUDE_KEYWORDS: &[&str] = &["bkg", "background", "quality", "pos_corr", "centr"];

/// Pre-search data conditioning flux.
const DETRENDED_FLUX_NAME: &str = "pdcsap_flux";
/// Simple aperture photometry flux.
const RAW_FLUX_NAME: &str = "sap_flux";

const PRECEDENCE_TIME_DATE: u8 = 2;
const PRECEDENCE_TIME_GENERIC: u8 = 1;
const PRECEDENCE_CADENCE: u8 = 1;
const PRECEDENCE_FLUX_DETRENDED: u8 = 3;
const PRECEDENCE_FLUX_RAW: u8 = 2;
const PRECEDENCE_FLUX_ANY: u8 = 1;

/// Columns need more than this many values to enter the variation fallback.
const VARIATION_MIN_VALUES: usize = 10;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// The role a matching rule assigns to a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// Uncertainty column; recorded, never used as time or flux.
    Error,
    Time,
    Cadence,
    Flux,
    /// Flux-like auxiliary column (background, quality, centroid, ...).
    Excluded,
}

/// One step of the classification chain.
#[derive(Clone, Copy)]
pub struct ColumnRule {
    pub name: &'static str,
    pub slot: Slot,
    pub precedence: u8,
    /// Stop evaluating later rules for this column after a match.
    pub terminal: bool,
    matches: fn(&str) -> bool,
}

impl ColumnRule {
    pub fn matches(&self, lower_name: &str) -> bool {
        (self.matches)(lower_name)
    }
}

fn contains_any(name: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| name.contains(k))
}

fn is_uncertainty(name: &str) -> bool {
    contains_any(name, ERROR_KEYWORDS)
}

fn is_date_like(name: &str) -> bool {
    contains_any(name, DATE_KEYWORDS)
}

/// `time` but not a time-correction column such as `TIMECORR`.
fn is_generic_time(name: &str) -> bool {
    name.contains("time") && !name.contains("corr")
}

fn is_cadence(name: &str) -> bool {
    contains_any(name, CADENCE_KEYWORDS)
}

fn is_flux(name: &str) -> bool {
    contains_any(name, FLUX_KEYWORDS)
}

fn is_auxiliary_flux(name: &str) -> bool {
    is_flux(name) && contains_any(name, FLUX_EXCLUDE_KEYWORDS)
}

fn is_detrended_flux(name: &str) -> bool {
    name == DETRENDED_FLUX_NAME
}

fn is_raw_flux(name: &str) -> bool {
    name == RAW_FLUX_NAME
}

/// The chain, evaluated top to bottom once per column.
pub const RULES: &[ColumnRule] = &[
    ColumnRule {
        name: "uncertainty",
        slot: Slot::Error,
        precedence: 0,
        terminal: true,
        matches: is_uncertainty,
    },
    ColumnRule {
        name: "date-like time",
        slot: Slot::Time,
        precedence: PRECEDENCE_TIME_DATE,
        terminal: false,
        matches: is_date_like,
    },
    ColumnRule {
        name: "generic time",
        slot: Slot::Time,
        precedence: PRECEDENCE_TIME_GENERIC,
        terminal: false,
        matches: is_generic_time,
    },
    ColumnRule {
        name: "cadence index",
        slot: Slot::Cadence,
        precedence: PRECEDENCE_CADENCE,
        terminal: false,
        matches: is_cadence,
    },
    ColumnRule {
        name: "auxiliary flux",
        slot: Slot::Excluded,
        precedence: 0,
        terminal: true,
        matches: is_auxiliary_flux,
    },
    ColumnRule {
        name: "detrended flux",
        slot: Slot::Flux,
        precedence: PRECEDENCE_FLUX_DETRENDED,
        terminal: true,
        matches: is_detrended_flux,
    },
    ColumnRule {
        name: "raw aperture flux",
        slot: Slot::Flux,
        precedence: PRECEDENCE_FLUX_RAW,
        terminal: true,
        matches: is_raw_flux,
    },
    ColumnRule {
        name: "flux",
        slot: Slot::Flux,
        precedence: PRECEDENCE_FLUX_ANY,
        terminal: true,
        matches: is_flux,
    },
];

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Errors raised while choosing columns.
#[derive(Debug, thiserror::Error)]
pub enum ColumnError {
    #[error(
        "could not automatically detect a flux column among {0:?}; the data needs time and flux columns"
    )]
    NoFluxColumn(Vec<String>),
}

/// How the flux column was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FluxSource {
    Name,
    /// Highest coefficient of variation among non-monotonic numeric columns.
    Variation,
}

/// Column indices chosen from a [`RawTable`].
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSelection {
    pub time: Option<usize>,
    pub flux: usize,
    pub flux_source: FluxSource,
    pub cadence: Option<usize>,
    pub errors: Vec<usize>,
    pub excluded: Vec<usize>,
}

/// Best candidate seen so far for one slot.
#[derive(Default)]
struct Pick {
    best: Option<(usize, u8)>,
}

impl Pick {
    fn offer(&mut self, column: usize, precedence: u8) {
        match self.best {
            Some((_, current)) if current >= precedence => {}
            _ => self.best = Some((column, precedence)),
        }
    }

    fn column(&self) -> Option<usize> {
        self.best.map(|(c, _)| c)
    }
}

/// Select the time, flux and cadence columns of `table`.
///
/// Name rules come first.  If none of them yields a flux column, every
/// numeric column with more than ten values (except the ones already
/// claimed or excluded) is ranked by `std / |mean|`, and the most variable
/// column that is *not* monotonic becomes the flux.  Monotonic columns
/// are assumed to be time-like.
pub fn classify(table: &RawTable) -> Result<ColumnSelection, ColumnError> {
    let mut time = Pick::default();
    let mut cadence = Pick::default();
    let mut flux = Pick::default();
    let mut errors = Vec::new();
    let mut excluded = Vec::new();

    for (j, name) in table.names().iter().enumerate() {
        let lower = name.trim().to_lowercase();
        for rule in RULES.iter().filter(|r| r.matches(&lower)) {
            debug!("Column {:?} matched rule '{}'", name, rule.name);
            match rule.slot {
                Slot::Error => errors.push(j),
                Slot::Excluded => excluded.push(j),
                Slot::Time => time.offer(j, rule.precedence),
                Slot::Cadence => cadence.offer(j, rule.precedence),
                Slot::Flux => flux.offer(j, rule.precedence),
            }
            if rule.terminal {
                break;
            }
        }
    }

    let time = time.column();
    let cadence = cadence.column();

    let (flux, flux_source) = match flux.column() {
        Some(j) => (j, FluxSource::Name),
        None => {
            let claimed: Vec<usize> = errors
                .iter()
                .chain(&excluded)
                .copied()
                .chain(time)
                .chain(cadence)
                .collect();
            match most_variable_column(table, &claimed) {
                Some(j) => (j, FluxSource::Variation),
                None => return Err(ColumnError::NoFluxColumn(table.names().to_vec())),
            }
        }
    };

    let name_of = |j: Option<usize>| j.map(|j| table.names()[j].as_str());
    info!(
        "Detected columns - Time: {:?}, Flux: {:?} ({:?}), Cadence: {:?}",
        name_of(time),
        table.names()[flux],
        flux_source,
        name_of(cadence),
    );

    Ok(ColumnSelection {
        time,
        flux,
        flux_source,
        cadence,
        errors,
        excluded,
    })
}

/// Coefficient-of-variation fallback for tables without a flux-like name.
fn most_variable_column(table: &RawTable, skip: &[usize]) -> Option<usize> {
    let mut ranked: Vec<(usize, f64, Vec<f64>)> = (0..table.n_cols())
        .filter(|j| !skip.contains(j) && table.is_numeric(*j))
        .filter_map(|j| {
            let values = table.present_values(j);
            if values.len() <= VARIATION_MIN_VALUES {
                return None;
            }
            let mean = stats::mean(&values);
            let cv = if mean != 0.0 {
                stats::std_dev(&values) / mean.abs()
            } else {
                0.0
            };
            Some((j, cv, values))
        })
        .collect();

    // Stable sort: equally variable columns keep table order.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    ranked
        .into_iter()
        .find(|(_, _, values)| !stats::is_monotonic(values))
        .map(|(j, _, _)| j)
}
