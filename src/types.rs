//! Acquisition and analysis data types.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Record of the acquisition at a single non-empty poll.
///
/// Contains the new amplitudes and the streamed estimate after folding them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Total number of repetitions fetched through this poll.
    pub num_so_far: usize,

    /// Amplitudes fetched at this poll, one row per repetition.
    pub z_raw: Array2<f64>,

    /// Streamed standard error of the mean (NaN before two repetitions).
    pub std_err: Array1<f64>,

    /// Streamed mean amplitude.
    pub mean: Array1<f64>,

    /// Amplitude of the averaged I/Q signal, as shown live against `x`.
    pub z_avg: Array1<f64>,

    /// Sweep values.
    pub x: Array1<f64>,
}

/// Comparison of the streamed estimate with the closed-form one for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Total number of repetitions.
    pub n_vals: usize,

    /// Two-pass mean amplitude.
    pub mean: Array1<f64>,

    /// Two-pass standard error of the mean.
    pub sem: Array1<f64>,

    /// Streamed mean amplitude of the last record.
    pub stream_mean: Array1<f64>,

    /// Streamed standard error of the last record.
    pub stream_sem: Array1<f64>,

    /// Largest absolute difference between the streamed and two-pass values.
    pub max_abs_dev: f64,
}
