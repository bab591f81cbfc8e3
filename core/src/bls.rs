//! Box-least-squares periodogram, the search at the heart of transit
//! detection.
//!
//! # Background
//!
//! A planet crossing the disc of its star blocks a small, fixed fraction
//! of the light for a few hours every orbit.  Folded at the right period
//! those dips stack on top of each other into a single box-shaped
//! depression; folded at any other period they smear out across phase.
//! The *box-least-squares* (BLS) search tries every candidate period and,
//! for each one, finds the box (phase offset and width) that best explains
//! the folded flux.  The improvement in χ² over a flat model is the power.
//!
//! # Algorithm overview
//!
//! 1. **Centre** the flux on its mean so in-box sums measure the dip.
//! 2. **Fold and bin**: for each period, phases `(t − t_min) mod P` are
//!    accumulated into bins a fraction of the shortest trial duration wide.
//! 3. **Box sweep**: for each trial duration a window of contiguous bins
//!    (wrapping around phase zero) is slid across the fold.  With `n_in`
//!    points summing to `s_in < 0` inside the window, out of `N` total:
//!
//!    ```text
//!    depth = −s_in · N / (n_in · (N − n_in))
//!    power = ½ · s_in² · N / (n_in · (N − n_in))
//!    ```
//!
//! 4. **Period sweep**: steps 2–3 are independent per period and run in
//!    parallel with **rayon**; the power curve keeps grid order.
//! 5. **Result**: the period with the highest power, the transit centre
//!    nearest the data start, and its fractional depth.

use log::{debug, info};
use rayon::prelude::*;

use crate::lightcurve::LightCurve;
use crate::stats;
use crate::types::{PeriodogramResult, SearchParams};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during a periodogram search.
#[derive(Debug, thiserror::Error)]
pub enum BlsError {
    #[error("light curve has {0} points; a periodogram needs at least 2")]
    TooFewPoints(usize),

    #[error("period grid is empty")]
    EmptyGrid,

    #[error("invalid trial period {0}")]
    InvalidPeriod(f64),

    #[error("search parameters invalid: {0}")]
    BadParams(String),
}

// ---------------------------------------------------------------------------
// BoxFit
// ---------------------------------------------------------------------------

/// The best box found for a single trial period.
#[derive(Clone, Copy, Debug, Default)]
struct BoxFit {
    power: f64,
    /// Phase of the box centre in `[0, P)`, measured from the first timestamp.
    centre_phase: f64,
    duration: f64,
    /// Fractional depth relative to the out-of-transit level.
    depth: f64,
    n_in: usize,
}

// ---------------------------------------------------------------------------
// BlsEngine
// ---------------------------------------------------------------------------

/// The box-least-squares search engine.
///
/// Construct with [`SearchParams`], derive a grid with
/// [`BlsEngine::period_grid`] and call [`BlsEngine::search`] on a light
/// curve to obtain a [`PeriodogramResult`].
#[derive(Clone, Debug, Default)]
pub struct BlsEngine {
    params: SearchParams,
}

impl BlsEngine {
    /// Create an engine.  A non-zero `n_workers` sizes rayon's global pool;
    /// the pool can only be built once per process, later requests are
    /// ignored.
    pub fn new(params: SearchParams) -> Self {
        configure_thread_pool(params.n_workers);
        Self { params }
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Candidate periods for data spanning `baseline` days.
    ///
    /// Long baselines search up to a third of the baseline (so at least
    /// three transits fit), capped; short ones use the fixed short-period
    /// window.
    pub fn period_grid(&self, baseline: f64) -> Vec<f64> {
        let p = &self.params;
        let (max_period, points) = if baseline > p.long_baseline_days {
            let max = (baseline / p.min_transits).min(p.long_max_period_cap);
            info!(
                "Long baseline detected ({:.1} days). Searching periods up to {:.1} days",
                baseline, max,
            );
            (max, p.long_grid_points)
        } else {
            info!(
                "Standard search: {:.1}-{:.1} days (data span: {:.1} days)",
                p.min_period, p.short_max_period, baseline,
            );
            (p.short_max_period, p.short_grid_points)
        };
        stats::linspace(p.min_period, max_period, points)
    }

    /// Evaluate the BLS power at every period in `periods`.
    pub fn search(&self, lc: &LightCurve, periods: &[f64]) -> Result<PeriodogramResult, BlsError> {
        if lc.len() < 2 {
            return Err(BlsError::TooFewPoints(lc.len()));
        }
        if periods.is_empty() {
            return Err(BlsError::EmptyGrid);
        }
        if let Some(&bad) = periods.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
            return Err(BlsError::InvalidPeriod(bad));
        }
        let durations: Vec<f64> = self
            .params
            .durations
            .iter()
            .copied()
            .filter(|d| d.is_finite() && *d > 0.0)
            .collect();
        if durations.is_empty() {
            return Err(BlsError::BadParams("no positive trial durations".into()));
        }

        let t0 = lc.start_time();
        let mean = lc.mean_flux();
        let centred: Vec<f64> = lc.flux().iter().map(|f| f - mean).collect();
        let folder = Folder {
            time: lc.time(),
            centred: &centred,
            t0,
            mean,
            durations: &durations,
            oversample: self.params.oversample.max(1),
            max_bins: self.params.max_bins.max(1),
        };

        debug!(
            "BLS over {} periods ({:.3}-{:.3} d), {} points, {} durations",
            periods.len(),
            periods[0],
            periods[periods.len() - 1],
            lc.len(),
            durations.len(),
        );

        let fits: Vec<BoxFit> = periods.par_iter().map(|&p| folder.best_box(p)).collect();

        // First maximum wins, so ties resolve to the shorter period.
        let (best_idx, best) = fits
            .iter()
            .enumerate()
            .fold((0, fits[0]), |acc, (i, fit)| if fit.power > acc.1.power { (i, *fit) } else { acc });

        let best_period = periods[best_idx];
        Ok(PeriodogramResult {
            periods: periods.to_vec(),
            power: fits.iter().map(|f| f.power).collect(),
            best_period,
            best_epoch: nearest_epoch(t0, best.centre_phase, best_period),
            best_depth: best.depth,
            best_duration: best.duration,
            best_in_transit: best.n_in,
        })
    }
}

fn configure_thread_pool(n_workers: usize) {
    if n_workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_workers)
            .build_global()
            .ok(); // ignore if already initialised
    }
}

/// Of the box centres just before and just after `t0`, the closer one.
fn nearest_epoch(t0: f64, centre_phase: f64, period: f64) -> f64 {
    if centre_phase > period / 2.0 {
        t0 + centre_phase - period
    } else {
        t0 + centre_phase
    }
}

// ---------------------------------------------------------------------------
// Folding
// ---------------------------------------------------------------------------

/// Shared, read-only inputs for evaluating one period.
struct Folder<'a> {
    time: &'a [f64],
    centred: &'a [f64],
    t0: f64,
    mean: f64,
    durations: &'a [f64],
    oversample: usize,
    max_bins: usize,
}

impl Folder<'_> {
    /// Fold at `period` and sweep every trial box over the binned phases.
    fn best_box(&self, period: f64) -> BoxFit {
        let shortest = self.durations.iter().copied().fold(f64::INFINITY, f64::min);
        let n_bins = ((period * self.oversample as f64 / shortest).ceil() as usize).clamp(1, self.max_bins);
        let bin_width = period / n_bins as f64;

        let mut counts = vec![0usize; n_bins];
        let mut sums = vec![0.0f64; n_bins];
        for (&t, &y) in self.time.iter().zip(self.centred) {
            let phase = (t - self.t0).rem_euclid(period);
            let bin = ((phase / bin_width) as usize).min(n_bins - 1);
            counts[bin] += 1;
            sums[bin] += y;
        }

        // Prefix sums over two laps so windows can wrap through phase zero.
        let mut cum_n = vec![0usize; 2 * n_bins + 1];
        let mut cum_s = vec![0.0f64; 2 * n_bins + 1];
        for i in 0..2 * n_bins {
            cum_n[i + 1] = cum_n[i] + counts[i % n_bins];
            cum_s[i + 1] = cum_s[i] + sums[i % n_bins];
        }

        let n_total = self.time.len();
        let total = n_total as f64;
        let mut best = BoxFit::default();
        let mut best_window = None;

        for &duration in self.durations {
            if duration >= period {
                continue;
            }
            let width = ((duration / bin_width).round() as usize).max(1);
            if width >= n_bins {
                continue;
            }
            for start in 0..n_bins {
                let n_in = cum_n[start + width] - cum_n[start];
                if n_in == 0 || n_in == n_total {
                    continue;
                }
                let s_in = cum_s[start + width] - cum_s[start];
                if s_in >= 0.0 {
                    continue; // brightening, not a transit
                }
                let n_in_f = n_in as f64;
                let power = 0.5 * s_in * s_in * total / (n_in_f * (total - n_in_f));
                if power > best.power {
                    best.power = power;
                    best_window = Some((start, width, n_in, s_in));
                }
            }
        }

        if let Some((start, width, n_in, s_in)) = best_window {
            let n_in_f = n_in as f64;
            let n_out = total - n_in_f;
            let depth = -s_in * total / (n_in_f * n_out);
            let out_level = self.mean - s_in / n_out;
            best.depth = if out_level > 0.0 { depth / out_level } else { depth };
            best.duration = width as f64 * bin_width;
            best.centre_phase = ((start as f64 + width as f64 / 2.0) * bin_width).rem_euclid(period);
            best.n_in = n_in;
        }
        best
    }
}
