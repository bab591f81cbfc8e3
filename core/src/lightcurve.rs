//! The light curve and its normalization.
//!
//! A [`LightCurve`] is a pair of equal-length `time`/`flux` sequences.
//! Stages may drop points (outlier rejection, transit masking) but never
//! reorder them or break the pairing between a timestamp and its flux.

use log::{info, warn};

use crate::stats;
use crate::types::NormalizeParams;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while building or conditioning a light curve.
#[derive(Debug, thiserror::Error)]
pub enum LightCurveError {
    #[error("time has {time} samples but flux has {flux}")]
    LengthMismatch { time: usize, flux: usize },

    #[error("insufficient data after {stage}: {points} usable points, need at least {required}")]
    InsufficientData {
        stage: &'static str,
        points: usize,
        required: usize,
    },

    #[error("flux baseline {0} cannot be normalized to 1.0")]
    InvalidBaseline(f64),
}

// ---------------------------------------------------------------------------
// LightCurve
// ---------------------------------------------------------------------------

/// Brightness of one star over time.  Never empty.
#[derive(Clone, Debug, PartialEq)]
pub struct LightCurve {
    time: Vec<f64>,
    flux: Vec<f64>,
}

impl LightCurve {
    pub fn new(time: Vec<f64>, flux: Vec<f64>) -> Result<Self, LightCurveError> {
        if time.len() != flux.len() {
            return Err(LightCurveError::LengthMismatch {
                time: time.len(),
                flux: flux.len(),
            });
        }
        if time.is_empty() {
            return Err(LightCurveError::InsufficientData {
                stage: "construction",
                points: 0,
                required: 1,
            });
        }
        Ok(Self { time, flux })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    /// Earliest timestamp.  The time axis need not be sorted.
    pub fn start_time(&self) -> f64 {
        self.time.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// `max(time) - min(time)`.
    pub fn baseline(&self) -> f64 {
        let end = self.time.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        end - self.start_time()
    }

    pub fn mean_flux(&self) -> f64 {
        stats::mean(&self.flux)
    }

    /// Population standard deviation of the flux.
    pub fn std_flux(&self) -> f64 {
        stats::std_dev(&self.flux)
    }

    pub fn median_flux(&self) -> f64 {
        stats::median(&self.flux)
    }

    /// Divide the flux by its median so the baseline sits at 1.0.
    ///
    /// Returns the baseline that was divided out.
    pub fn normalize(&mut self) -> Result<f64, LightCurveError> {
        let baseline = self.median_flux();
        if !baseline.is_finite() || baseline == 0.0 {
            return Err(LightCurveError::InvalidBaseline(baseline));
        }
        if baseline < 0.0 {
            warn!("Negative flux baseline {baseline}; dips will appear as peaks");
        }
        for f in &mut self.flux {
            *f /= baseline;
        }
        Ok(baseline)
    }

    /// Drop points further than `sigma` standard deviations from the
    /// median flux.  A single pass; returns the number of removed points.
    ///
    /// A constant curve has zero scatter and loses nothing.
    pub fn remove_outliers(&mut self, sigma: f64) -> usize {
        let center = self.median_flux();
        let scatter = self.std_flux();
        let limit = sigma * scatter;
        if limit.is_nan() || limit <= 0.0 {
            return 0;
        }
        let keep: Vec<bool> = self.flux.iter().map(|f| (f - center).abs() <= limit).collect();
        if !keep.contains(&true) {
            warn!("Outlier threshold {sigma}σ would reject every point; skipping");
            return 0;
        }
        self.retain_mask(&keep)
    }

    /// Keep only the points whose entry in `keep` is true, preserving
    /// order.  Returns the number of removed points.
    ///
    /// `keep` must be as long as the curve and retain at least one point.
    pub(crate) fn retain_mask(&mut self, keep: &[bool]) -> usize {
        debug_assert_eq!(keep.len(), self.len());
        let before = self.len();
        let mut it = keep.iter();
        self.time.retain(|_| *it.next().unwrap_or(&true));
        let mut it = keep.iter();
        self.flux.retain(|_| *it.next().unwrap_or(&true));
        before - self.len()
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Rescale to a unit baseline, then reject gross outliers.
///
/// Returns the number of points removed as outliers.
pub fn normalize(lc: &mut LightCurve, params: &NormalizeParams) -> Result<usize, LightCurveError> {
    let baseline = lc.normalize()?;
    let removed = lc.remove_outliers(params.outlier_sigma);
    info!(
        "Normalized by baseline {:.6}; removed {} outliers beyond {:.1}σ, {} points remain",
        baseline,
        removed,
        params.outlier_sigma,
        lc.len(),
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn curve(flux: Vec<f64>) -> LightCurve {
        let time = (0..flux.len()).map(|i| i as f64 * 0.0204).collect();
        LightCurve::new(time, flux).unwrap()
    }

    #[test]
    fn constant_curve_normalizes_to_one_and_keeps_every_point() {
        let mut lc = curve(vec![5423.7; 500]);
        let removed = normalize(&mut lc, &NormalizeParams::default()).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(lc.len(), 500);
        assert!(lc.flux().iter().all(|&f| f == 1.0));
    }

    #[test]
    fn gross_outlier_is_removed_but_transit_dip_survives() {
        let mut flux: Vec<f64> = (0..1000).map(|i| 100.0 + ((i * 13 % 17) as f64 - 8.0) * 0.01).collect();
        for f in &mut flux[400..410] {
            *f -= 1.0; // 1% dip
        }
        flux[700] = 1e4;
        let mut lc = curve(flux);

        let removed = normalize(&mut lc, &NormalizeParams::default()).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(lc.len(), 999);
        let min = lc.flux().iter().copied().fold(f64::INFINITY, f64::min);
        assert!(min < 0.991);
        assert_relative_eq!(lc.median_flux(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn removal_preserves_time_flux_pairing() {
        let mut lc = LightCurve::new(vec![3.0, 1.0, 2.0, 0.0], vec![30.0, 10.0, 20.0, 0.0]).unwrap();
        lc.retain_mask(&[true, false, true, true]);
        assert_eq!(lc.time(), &[3.0, 2.0, 0.0]);
        assert_eq!(lc.flux(), &[30.0, 20.0, 0.0]);
        assert_eq!(lc.start_time(), 0.0);
        assert_eq!(lc.baseline(), 3.0);
    }

    #[test]
    fn zero_baseline_is_rejected() {
        let mut lc = curve(vec![0.0; 20]);
        assert!(matches!(lc.normalize(), Err(LightCurveError::InvalidBaseline(_))));
    }

    #[test]
    fn construction_checks_lengths() {
        assert!(matches!(
            LightCurve::new(vec![1.0, 2.0], vec![1.0]),
            Err(LightCurveError::LengthMismatch { time: 2, flux: 1 })
        ));
        assert!(LightCurve::new(Vec::new(), Vec::new()).is_err());
    }
}
