//! Sweep and signal model of the simulated measurement.

use crate::config::SourceConfig;
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Linear sweep from `start` to `stop` (inclusive) in steps of `step`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Sweep {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Sweep {
    /// Number of sweep points, the stop value included.
    pub fn n_points(&self) -> usize {
        ((self.stop - self.start) / self.step).round().max(0.0) as usize + 1
    }

    /// Sweep values, one per channel.
    pub fn values(&self) -> Array1<f64> {
        Array1::from_iter((0..self.n_points()).map(|i_pt| self.start + i_pt as f64 * self.step))
    }
}

/// Noiseless I/Q response at sweep value `x`.
pub fn ideal_iq(cfg: &SourceConfig, x: f64) -> (f64, f64) {
    let i = cfg.offset_i + cfg.amp * (TAU * x / cfg.period).cos();
    (i, cfg.offset_q)
}

/// Sample `n_reps` noisy repetitions of the whole sweep.
///
/// Returns the I and Q quadratures, each of shape `(n_reps, xs.len())`.
pub fn sample_iq<R: Rng>(
    cfg: &SourceConfig,
    xs: ArrayView1<f64>,
    n_reps: usize,
    rng: &mut R,
) -> Result<(Array2<f64>, Array2<f64>)> {
    let noise_dist = Normal::new(0.0, cfg.noise)?;

    let mut i_raw = Array2::zeros((n_reps, xs.len()));
    let mut q_raw = Array2::zeros((n_reps, xs.len()));
    for (mut i_row, mut q_row) in i_raw.outer_iter_mut().zip(q_raw.outer_iter_mut()) {
        for (i_pt, &x) in xs.iter().enumerate() {
            let (i, q) = ideal_iq(cfg, x);
            i_row[i_pt] = i + noise_dist.sample(rng);
            q_row[i_pt] = q + noise_dist.sample(rng);
        }
    }

    Ok((i_raw, q_raw))
}
