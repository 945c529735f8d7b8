//! Simulated result handle of a running measurement.
//!
//! Each poll hands out whatever repetitions became available since the last
//! one, together with the stream-processed quantities the hardware would
//! compute: per-repetition amplitudes, their running average over the whole
//! stream, and the amplitude of the averaged signal.

use crate::config::{Config, SourceConfig};
use crate::model::sample_iq;
use crate::stats::running_means;
use anyhow::{Context, Result};
use ndarray::{Array1, Array2, Axis, Zip};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Uniform};
use serde::{Deserialize, Serialize};

/// Named result streams of one poll.
///
/// Per-repetition streams have shape `(n_new, n_points)`.
#[derive(Debug, Clone)]
pub struct Results {
    /// Amplitude `sqrt(I^2 + Q^2)` of every repetition.
    pub z_raw: Array2<f64>,
    /// Running average of `z_raw` over the whole stream.
    pub z_raw_avg: Array2<f64>,
    /// Amplitude of the running-averaged I/Q signal.
    pub z_avg: Array1<f64>,
    /// Sweep values.
    pub x: Array1<f64>,
}

#[derive(Serialize, Deserialize)]
pub struct Fetcher {
    source: SourceConfig,
    reps: usize,
    max_batch: usize,
    prob_idle: f64,
    xs: Array1<f64>,
    num_so_far: usize,
    i_sum: Array1<f64>,
    q_sum: Array1<f64>,
    z_sum: Array1<f64>,
    rng: ChaCha12Rng,
}

impl Fetcher {
    pub fn new(cfg: &Config, rng: ChaCha12Rng) -> Self {
        let xs = cfg.sweep.values();
        let n_points = xs.len();
        Self {
            source: cfg.source.clone(),
            reps: cfg.fetch.reps,
            max_batch: cfg.fetch.max_batch,
            prob_idle: cfg.fetch.prob_idle,
            xs,
            num_so_far: 0,
            i_sum: Array1::zeros(n_points),
            q_sum: Array1::zeros(n_points),
            z_sum: Array1::zeros(n_points),
            rng,
        }
    }

    /// Total number of repetitions handed out so far.
    pub fn num_so_far(&self) -> usize {
        self.num_so_far
    }

    pub fn is_fetching(&self) -> bool {
        self.num_so_far < self.reps
    }

    /// Poll for new results.
    ///
    /// Returns `None` if no new results are available, otherwise the updated
    /// total count and the new results.
    pub fn fetch(&mut self) -> Result<Option<(usize, Results)>> {
        let remaining = self.reps - self.num_so_far;
        if remaining == 0 {
            return Ok(None);
        }

        let idle_dist = Bernoulli::new(self.prob_idle)?;
        if idle_dist.sample(&mut self.rng) {
            return Ok(None);
        }

        let batch_dist = Uniform::new_inclusive(1, self.max_batch.min(remaining))?;
        let n_new = batch_dist.sample(&mut self.rng);

        let (i, q) = sample_iq(&self.source, self.xs.view(), n_new, &mut self.rng)
            .context("failed to sample signal")?;
        let z_raw = Zip::from(&i).and(&q).map_collect(|&i, &q| i.hypot(q));
        let z_raw_avg = running_means(z_raw.view(), self.z_sum.view(), self.num_so_far)
            .context("failed to compute running averages")?;

        self.i_sum += &i.sum_axis(Axis(0));
        self.q_sum += &q.sum_axis(Axis(0));
        self.z_sum += &z_raw.sum_axis(Axis(0));
        self.num_so_far += n_new;

        let n = self.num_so_far as f64;
        let z_avg = Zip::from(&self.i_sum)
            .and(&self.q_sum)
            .map_collect(|&i, &q| (i / n).hypot(q / n));

        let results = Results {
            z_raw,
            z_raw_avg,
            z_avg,
            x: self.xs.clone(),
        };
        Ok(Some((self.num_so_far, results)))
    }
}
