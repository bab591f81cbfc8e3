//! Feature tuples for the disposition classifier.
//!
//! The classifier service scores transit parameters together with a
//! one-hot survey indicator.  This module only produces that input; the
//! detection core never calls the classifier itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::DetectedSignal;

/// Survey that produced the light curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Survey {
    Kepler,
    K2,
    Tess,
    #[default]
    Other,
}

impl FromStr for Survey {
    type Err = std::convert::Infallible;

    /// Unknown names map to [`Survey::Other`], as the classifier encodes
    /// them with an all-zero indicator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "kepler" => Survey::Kepler,
            "k2" => Survey::K2,
            "tess" => Survey::Tess,
            _ => Survey::Other,
        })
    }
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Survey::Kepler => "kepler",
            Survey::K2 => "k2",
            Survey::Tess => "tess",
            Survey::Other => "other",
        };
        f.write_str(name)
    }
}

/// One classifier input row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitFeatures {
    /// Days.
    pub period: f64,
    /// Earth radii.
    pub radius: f64,
    /// Parts per million.
    pub depth: f64,
    pub snr: f64,
    /// Hours.
    pub duration: f64,
    pub dataset: Survey,
}

impl TransitFeatures {
    pub fn from_signal(signal: &DetectedSignal, dataset: Survey) -> Self {
        Self {
            period: signal.orbital_period,
            radius: signal.estimated_radius,
            depth: signal.transit_depth,
            snr: signal.signal_to_noise,
            duration: signal.estimated_transit_duration,
            dataset,
        }
    }

    /// `[period, radius, depth, snr, duration, is_kepler, is_k2, is_tess]`
    pub fn to_vector(&self) -> [f64; 8] {
        let flag = |s: Survey| if self.dataset == s { 1.0 } else { 0.0 };
        [
            self.period,
            self.radius,
            self.depth,
            self.snr,
            self.duration,
            flag(Survey::Kepler),
            flag(Survey::K2),
            flag(Survey::Tess),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survey_names_parse_case_insensitively() {
        assert_eq!("Kepler".parse::<Survey>().unwrap(), Survey::Kepler);
        assert_eq!(" TESS ".parse::<Survey>().unwrap(), Survey::Tess);
        assert_eq!("k2".parse::<Survey>().unwrap(), Survey::K2);
        assert_eq!("corot".parse::<Survey>().unwrap(), Survey::Other);
    }

    #[test]
    fn vector_carries_one_hot_survey() {
        let signal = DetectedSignal {
            orbital_period: 10.5,
            transit_epoch: 3.0,
            transit_depth: 500.0,
            signal_to_noise: 15.0,
            estimated_transit_duration: 25.2,
            estimated_radius: 2.3,
        };
        let tess = TransitFeatures::from_signal(&signal, Survey::Tess);
        assert_eq!(tess.to_vector(), [10.5, 2.3, 500.0, 15.0, 25.2, 0.0, 0.0, 1.0]);

        let other = TransitFeatures::from_signal(&signal, Survey::Other);
        assert_eq!(&other.to_vector()[5..], &[0.0, 0.0, 0.0]);

        let json = serde_json::to_value(&tess).unwrap();
        assert_eq!(json["dataset"], "tess");
    }
}
