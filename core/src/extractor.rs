//! Iterative multi-signal extraction.
//!
//! Systems with several planets show several interleaved transit trains.
//! The extractor repeatedly runs the BLS search on a *working copy* of the
//! light curve, accepts the strongest periodic dip if it is significant
//! enough, cuts that signal's transits out of the working copy and searches
//! again.  Each pass demands more evidence than the last, because residual
//! structure from imperfect masking inflates spurious power.
//!
//! The loop is an explicit state machine: every pass ends in a
//! [`LoopState`], and only [`LoopState::Continue`] leads to another pass.

use log::{info, warn};

use crate::bls::{BlsEngine, BlsError};
use crate::lightcurve::LightCurve;
use crate::stats;
use crate::types::{DetectedSignal, ExtractorParams, PeriodogramResult, SearchParams};

/// Parts per million in a fraction.
const PPM: f64 = 1e6;
const HOURS_PER_DAY: f64 = 24.0;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Failures while masking an accepted signal out of the working curve.
///
/// These never abort a run; they end the search and keep what was found.
#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    #[error("cannot fold on period {0}")]
    InvalidPeriod(f64),

    #[error("cannot fold on transit epoch {0}")]
    InvalidEpoch(f64),

    #[error("phase is undefined at t = {0}")]
    UndefinedPhase(f64),

    #[error("mask would remove all {0} remaining points")]
    NothingLeft(usize),
}

// ---------------------------------------------------------------------------
// Loop state
// ---------------------------------------------------------------------------

/// Outcome of one extraction pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// A signal was accepted and masked; search again.
    Continue,
    /// The periodogram or the best box was not significant enough.
    StopLowSnr,
    /// Too few points remain for a reliable search.
    StopInsufficientData,
    /// The accepted signal could not be masked out.
    StopMaskError,
    /// The periodogram itself could not be computed.
    StopSearchError,
    /// The signal limit was reached.
    StopMaxIterations,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        self != LoopState::Continue
    }
}

/// Signals found by one extraction run and why it stopped.
#[derive(Clone, Debug, PartialEq)]
pub struct Extraction {
    /// Strongest first.
    pub signals: Vec<DetectedSignal>,
    pub stop: LoopState,
    /// Number of BLS passes that were run.
    pub iterations: usize,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// How far the highest peak stands above the rest of the power curve:
/// `(max − median) / std`.  A flat periodogram has no peak and scores 0.
pub fn periodogram_snr(power: &[f64]) -> f64 {
    let spread = stats::std_dev(power);
    if !(spread.is_finite() && spread > 0.0) {
        return 0.0;
    }
    let max = power.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (max - stats::median(power)) / spread
}

/// Transit phase of `t` in `[-0.5, 0.5)`, zero at transit centre.
pub fn transit_phase(t: f64, epoch: f64, period: f64) -> f64 {
    ((t - epoch) / period + 0.5).rem_euclid(1.0) - 0.5
}

/// Remove every point within `half_phase` of a transit centre.
///
/// Returns the number of removed points.  The curve is left untouched on
/// error.
pub fn mask_transits(lc: &mut LightCurve, period: f64, epoch: f64, half_phase: f64) -> Result<usize, MaskError> {
    if !(period.is_finite() && period > 0.0) {
        return Err(MaskError::InvalidPeriod(period));
    }
    if !epoch.is_finite() {
        return Err(MaskError::InvalidEpoch(epoch));
    }

    let mut keep = Vec::with_capacity(lc.len());
    for &t in lc.time() {
        let phase = transit_phase(t, epoch, period);
        if phase.is_nan() {
            return Err(MaskError::UndefinedPhase(t));
        }
        keep.push(phase.abs() >= half_phase);
    }
    if !keep.contains(&true) {
        return Err(MaskError::NothingLeft(lc.len()));
    }
    Ok(lc.retain_mask(&keep))
}

// ---------------------------------------------------------------------------
// MultiSignalExtractor
// ---------------------------------------------------------------------------

/// Detect-and-subtract driver around a [`BlsEngine`].
#[derive(Clone, Debug, Default)]
pub struct MultiSignalExtractor {
    engine: BlsEngine,
    params: ExtractorParams,
}

impl MultiSignalExtractor {
    pub fn new(search: SearchParams, params: ExtractorParams) -> Self {
        Self {
            engine: BlsEngine::new(search),
            params,
        }
    }

    /// Find up to `max_signals` periodic transit signals in `lc`.
    ///
    /// `lc` is not modified; the search runs on a shrinking working copy.
    /// The period grid is derived once from the baseline of `lc`.
    pub fn extract(&self, lc: &LightCurve) -> Extraction {
        let grid = self.engine.period_grid(lc.baseline());
        let mut working = lc.clone();
        let mut signals = Vec::new();
        let mut iterations = 0;

        let mut state = if self.params.max_signals == 0 {
            LoopState::StopMaxIterations
        } else {
            LoopState::Continue
        };

        while !state.is_terminal() {
            state = self.step(iterations, &grid, &mut working, &mut signals);
            iterations += 1;
        }

        info!(
            "Extraction finished after {} iteration(s): {} signal(s), stop reason {:?}",
            iterations,
            signals.len(),
            state,
        );

        Extraction {
            signals,
            stop: state,
            iterations,
        }
    }

    /// One search → accept → mask pass.
    fn step(
        &self,
        iteration: usize,
        grid: &[f64],
        working: &mut LightCurve,
        signals: &mut Vec<DetectedSignal>,
    ) -> LoopState {
        let periodogram = match self.engine.search(working, grid) {
            Ok(p) => p,
            Err(BlsError::TooFewPoints(n)) => {
                warn!("Only {n} points left; stopping search");
                return LoopState::StopInsufficientData;
            }
            Err(e) => {
                warn!("Periodogram failed on iteration {}: {}", iteration + 1, e);
                return LoopState::StopSearchError;
            }
        };

        let snr = periodogram_snr(&periodogram.power);
        let threshold = self.params.snr_threshold(iteration);
        if snr < threshold {
            info!(
                "Iteration {}: SNR {:.2} below threshold {:.2}",
                iteration + 1,
                snr,
                threshold,
            );
            return LoopState::StopLowSnr;
        }

        let box_snr = self.box_significance(&periodogram, working);
        if periodogram.best_depth <= 0.0 || box_snr < self.params.min_depth_snr {
            info!(
                "Iteration {}: best box at {:.4} d not significant (depth {:.2e}, box SNR {:.2} < {:.2})",
                iteration + 1,
                periodogram.best_period,
                periodogram.best_depth,
                box_snr,
                self.params.min_depth_snr,
            );
            return LoopState::StopLowSnr;
        }

        let signal = self.derive_signal(&periodogram, snr);
        info!(
            "Iteration {}: accepted P = {:.4} d, T0 = {:.4}, depth = {:.0} ppm, SNR = {:.2}",
            iteration + 1,
            signal.orbital_period,
            signal.transit_epoch,
            signal.transit_depth,
            signal.signal_to_noise,
        );
        signals.push(signal);

        match mask_transits(
            working,
            periodogram.best_period,
            periodogram.best_epoch,
            self.params.mask_half_phase,
        ) {
            Ok(removed) => {
                info!("Masked {} in-transit points, {} remain", removed, working.len());
            }
            Err(MaskError::NothingLeft(n)) => {
                warn!("Masking planet {} would remove all {} points", signals.len(), n);
                return LoopState::StopInsufficientData;
            }
            Err(e) => {
                warn!("Error masking planet {}: {}", signals.len(), e);
                return LoopState::StopMaskError;
            }
        }

        if signals.len() >= self.params.max_signals {
            return LoopState::StopMaxIterations;
        }
        if working.len() < self.params.min_remaining_points {
            return LoopState::StopInsufficientData;
        }
        LoopState::Continue
    }

    /// Significance of the best box in units of the working curve's scatter.
    ///
    /// The BLS power is half the χ² improvement at unit weights, so the
    /// box's own SNR is `sqrt(2 · power) / σ`.
    fn box_significance(&self, periodogram: &PeriodogramResult, working: &LightCurve) -> f64 {
        let sigma = working.std_flux();
        if !(sigma.is_finite() && sigma > 0.0) {
            return 0.0;
        }
        (2.0 * periodogram.max_power()).sqrt() / sigma
    }

    fn derive_signal(&self, periodogram: &PeriodogramResult, snr: f64) -> DetectedSignal {
        let period = periodogram.best_period;
        let depth = periodogram.best_depth;
        DetectedSignal {
            orbital_period: period,
            transit_epoch: periodogram.best_epoch,
            transit_depth: depth * PPM,
            signal_to_noise: snr,
            estimated_transit_duration: self.params.duration_fraction * period * HOURS_PER_DAY,
            estimated_radius: depth.sqrt() * self.params.stellar_radius_earth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn snr_of_flat_periodogram_is_zero() {
        assert_eq!(periodogram_snr(&[0.0; 100]), 0.0);
        assert_eq!(periodogram_snr(&[3.5; 10]), 0.0);
    }

    #[test]
    fn snr_measures_peak_against_spread() {
        let mut power = vec![1.0; 99];
        power.push(11.0);
        let expected = (11.0 - 1.0) / stats::std_dev(&power);
        assert_relative_eq!(periodogram_snr(&power), expected);
        assert!(periodogram_snr(&power) > 9.0);
    }

    #[test]
    fn phase_wraps_into_half_open_interval() {
        assert_relative_eq!(transit_phase(10.0, 10.0, 4.0), 0.0);
        assert_relative_eq!(transit_phase(11.0, 10.0, 4.0), 0.25);
        assert_relative_eq!(transit_phase(13.0, 10.0, 4.0), -0.25);
        assert_relative_eq!(transit_phase(12.0, 10.0, 4.0), -0.5);
        assert_relative_eq!(transit_phase(2.0, 10.0, 4.0), 0.0);
    }

    #[test]
    fn mask_removes_twenty_percent_window_around_each_transit() {
        let time: Vec<f64> = (0..1000).map(|i| i as f64 * 0.01).collect();
        let mut lc = LightCurve::new(time, vec![1.0; 1000]).unwrap();
        let removed = mask_transits(&mut lc, 2.0, 0.5, 0.1).unwrap();

        // 20% of every 2-day cycle over 10 days.
        assert!((195..=205).contains(&removed), "removed {removed}");
        assert!(lc.time().iter().all(|&t| transit_phase(t, 0.5, 2.0).abs() >= 0.1));
    }

    #[test]
    fn mask_rejects_bad_geometry_and_leaves_curve_alone() {
        let time: Vec<f64> = (0..200).map(|i| i as f64 * 0.1).collect();
        let mut lc = LightCurve::new(time, vec![1.0; 200]).unwrap();
        let before = lc.clone();

        assert!(matches!(mask_transits(&mut lc, 0.0, 1.0, 0.1), Err(MaskError::InvalidPeriod(_))));
        assert!(matches!(mask_transits(&mut lc, f64::NAN, 1.0, 0.1), Err(MaskError::InvalidPeriod(_))));
        assert!(matches!(mask_transits(&mut lc, 2.0, f64::INFINITY, 0.1), Err(MaskError::InvalidEpoch(_))));
        assert!(matches!(mask_transits(&mut lc, 2.0, 1.0, 0.6), Err(MaskError::NothingLeft(200))));
        assert_eq!(lc, before);
    }

    #[test]
    fn constant_curve_yields_no_signals() {
        let time: Vec<f64> = (0..800).map(|i| i as f64 * 0.0204).collect();
        let lc = LightCurve::new(time, vec![1.0; 800]).unwrap();
        let search = SearchParams {
            short_grid_points: 400,
            ..SearchParams::default()
        };
        let extraction = MultiSignalExtractor::new(search, ExtractorParams::default()).extract(&lc);

        assert!(extraction.signals.is_empty());
        assert_eq!(extraction.stop, LoopState::StopLowSnr);
        assert_eq!(extraction.iterations, 1);
    }

    /// 120 long-cadence points with a deep 0.9-day transit and a small
    /// deterministic ripple; one mask leaves fewer than 100 points.
    fn short_transit_curve() -> LightCurve {
        let time: Vec<f64> = (0..120).map(|i| i as f64 * 0.0204).collect();
        let flux = time
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let ripple = ((i * 37 % 101) as f64 - 50.0) * 2e-5;
                let dip = if transit_phase(t, 0.3, 0.9).abs() * 0.9 < 0.05 { 0.02 } else { 0.0 };
                1.0 + ripple - dip
            })
            .collect();
        LightCurve::new(time, flux).unwrap()
    }

    #[test]
    fn signal_limit_outranks_remaining_points() {
        let params = ExtractorParams {
            max_signals: 1,
            ..ExtractorParams::default()
        };
        let extraction = MultiSignalExtractor::new(SearchParams::default(), params).extract(&short_transit_curve());

        assert_eq!(extraction.signals.len(), 1);
        assert_eq!(extraction.stop, LoopState::StopMaxIterations);
    }

    #[test]
    fn too_few_points_after_masking_stops_search() {
        let extraction = MultiSignalExtractor::default().extract(&short_transit_curve());

        assert_eq!(extraction.signals.len(), 1);
        assert_eq!(extraction.stop, LoopState::StopInsufficientData);
        assert_eq!(extraction.iterations, 1);
    }

    #[test]
    fn zero_signal_limit_stops_immediately() {
        let time: Vec<f64> = (0..200).map(|i| i as f64 * 0.0204).collect();
        let lc = LightCurve::new(time, vec![1.0; 200]).unwrap();
        let params = ExtractorParams {
            max_signals: 0,
            ..ExtractorParams::default()
        };
        let extraction = MultiSignalExtractor::new(SearchParams::default(), params).extract(&lc);
        assert_eq!(extraction.stop, LoopState::StopMaxIterations);
        assert_eq!(extraction.iterations, 0);
    }
}
