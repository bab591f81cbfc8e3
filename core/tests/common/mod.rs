//! Synthetic light curves shared by the integration tests.
#![allow(dead_code)]

use std::f64::consts::PI;
use std::fmt::Write as _;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const CADENCE: f64 = 0.0204;

/// A box-shaped transit train.
#[derive(Clone, Copy, Debug)]
pub struct Transit {
    pub period: f64,
    pub epoch: f64,
    pub duration: f64,
    pub depth: f64,
}

impl Transit {
    pub fn dip(&self, t: f64) -> f64 {
        let phase = ((t - self.epoch) / self.period + 0.5).rem_euclid(1.0) - 0.5;
        if (phase * self.period).abs() < self.duration / 2.0 {
            self.depth
        } else {
            0.0
        }
    }
}

/// Gaussian noise from a seeded generator (Box-Muller).
pub struct Noise {
    rng: StdRng,
    sigma: f64,
}

impl Noise {
    pub fn new(seed: u64, sigma: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sigma,
        }
    }

    pub fn sample(&mut self) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen();
        self.sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

/// Evenly sampled times covering `days` at long cadence.
pub fn times(days: f64) -> Vec<f64> {
    let n = (days / CADENCE).round() as usize;
    (0..n).map(|i| i as f64 * CADENCE).collect()
}

/// Unit flux with noise and the given transits subtracted.
pub fn flux(time: &[f64], transits: &[Transit], noise: &mut Noise) -> Vec<f64> {
    time.iter()
        .map(|&t| 1.0 + noise.sample() - transits.iter().map(|tr| tr.dip(t)).sum::<f64>())
        .collect()
}

/// Render columns as delimited text with a header line.
pub fn to_text(header: &[&str], columns: &[Vec<f64>], delimiter: char) -> String {
    let mut out = header.join(&delimiter.to_string());
    out.push('\n');
    let rows = columns.first().map_or(0, Vec::len);
    for i in 0..rows {
        for (j, col) in columns.iter().enumerate() {
            if j > 0 {
                out.push(delimiter);
            }
            write!(out, "{:.8}", col[i]).unwrap();
        }
        out.push('\n');
    }
    out
}
