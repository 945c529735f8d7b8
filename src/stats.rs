//! Incremental standard error of the mean over batched, vector-valued streams.
//!
//! Each row of a batch is one sample and each column one channel. The caller
//! supplies, next to the batch, the cumulative running mean of the whole
//! stream at every row, and threads the returned [`StatsState`] back into the
//! next call through [`History`].

use crate::error::StatsError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Resumable aggregator state after some number of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsState {
    mean: Array1<f64>,
    diff_2_sum: Array1<f64>,
    n_vals: usize,
}

/// What the stream has seen before the current batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum History {
    /// No values yet: the first sample of the next batch seeds the recurrence.
    #[default]
    Fresh,
    /// State returned by a previous call, passed back verbatim.
    Resumed(StatsState),
}

/// Result of a successful [`update`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatsUpdate {
    /// Standard error of the mean, per channel.
    pub std_err: Array1<f64>,
    /// State to pass back with the next batch.
    pub state: StatsState,
}

impl StatsState {
    /// Mean of all values folded so far, per channel.
    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    /// Sum of squared deviations from the mean, per channel.
    pub fn diff_2_sum(&self) -> ArrayView1<'_, f64> {
        self.diff_2_sum.view()
    }

    pub fn n_vals(&self) -> usize {
        self.n_vals
    }

    pub fn n_channels(&self) -> usize {
        self.mean.len()
    }

    /// Sample variance, per channel.
    pub fn variance(&self) -> Result<Array1<f64>, StatsError> {
        check_n_vals(self.n_vals, 2)?;
        let n = self.n_vals as f64;
        Ok(self.diff_2_sum.mapv(|s| s / (n - 1.0)))
    }

    /// Standard error of the mean, `sqrt(diff_2_sum / (n * (n - 1)))` per channel.
    pub fn std_err(&self) -> Result<Array1<f64>, StatsError> {
        check_n_vals(self.n_vals, 2)?;
        let n = self.n_vals as f64;
        Ok(self.diff_2_sum.mapv(|s| (s / (n * (n - 1.0))).sqrt()))
    }
}

impl History {
    pub fn state(&self) -> Option<&StatsState> {
        match self {
            History::Fresh => None,
            History::Resumed(state) => Some(state),
        }
    }

    /// Number of values folded so far.
    pub fn n_vals(&self) -> usize {
        self.state().map_or(0, StatsState::n_vals)
    }
}

impl From<StatsState> for History {
    fn from(state: StatsState) -> Self {
        History::Resumed(state)
    }
}

/// Fold a batch into the stream and estimate the standard error of the mean.
///
/// `n_vals` is the total number of values in the stream through the end of
/// `batch` and must be at least 2. `running_means` must have the shape of
/// `batch`, its row `i` being the mean of the whole stream through `batch[i]`.
///
/// # Errors
/// Returns a [`StatsError`] if the batch is empty, the shapes disagree, the
/// count is below 2, or the count does not continue the one in `history`.
pub fn update(
    batch: ArrayView2<f64>,
    running_means: ArrayView2<f64>,
    n_vals: usize,
    history: &History,
) -> Result<StatsUpdate, StatsError> {
    check_inputs(batch, running_means, n_vals, history, 2)?;
    let state = fold(batch, running_means, n_vals, history);
    let std_err = state.std_err()?;
    Ok(StatsUpdate { std_err, state })
}

/// Fold a batch into the stream without estimating the standard error.
///
/// Same contract as [`update`], except that a single value is accepted so a
/// stream may start with a one-sample batch.
pub fn absorb(
    batch: ArrayView2<f64>,
    running_means: ArrayView2<f64>,
    n_vals: usize,
    history: &History,
) -> Result<StatsState, StatsError> {
    check_inputs(batch, running_means, n_vals, history, 1)?;
    Ok(fold(batch, running_means, n_vals, history))
}

fn check_inputs(
    batch: ArrayView2<f64>,
    running_means: ArrayView2<f64>,
    n_vals: usize,
    history: &History,
    min_n_vals: usize,
) -> Result<(), StatsError> {
    if batch.nrows() == 0 {
        return Err(StatsError::EmptyBatch);
    }
    if running_means.dim() != batch.dim() {
        return Err(StatsError::ShapeMismatch {
            expected: batch.dim(),
            found: running_means.dim(),
        });
    }
    if let History::Resumed(prior) = history {
        if prior.n_channels() != batch.ncols() {
            return Err(StatsError::ShapeMismatch {
                expected: (batch.nrows(), prior.n_channels()),
                found: batch.dim(),
            });
        }
    }
    check_n_vals(n_vals, min_n_vals)?;

    let expected = history.n_vals() + batch.nrows();
    if n_vals != expected {
        return Err(StatsError::CountMismatch {
            expected,
            found: n_vals,
        });
    }

    Ok(())
}

fn check_n_vals(n_vals: usize, min: usize) -> Result<(), StatsError> {
    if n_vals < min {
        return Err(StatsError::InvalidSampleSize { n_vals, min });
    }
    Ok(())
}

/// Welford recurrence `s_k = s_{k-1} + (x_k - m_k) * (x_k - m_{k-1})`, per channel.
///
/// Inputs must already be validated.
fn fold(
    batch: ArrayView2<f64>,
    running_means: ArrayView2<f64>,
    n_vals: usize,
    history: &History,
) -> StatsState {
    let (seed_mean, mut diff_2_sum, n_seed) = match history {
        History::Fresh => (batch.row(0).to_owned(), Array1::zeros(batch.ncols()), 1),
        History::Resumed(prior) => (prior.mean.clone(), prior.diff_2_sum.clone(), 0),
    };

    let mut prev_mean = seed_mean.view();
    for (val, mean) in batch
        .outer_iter()
        .zip(running_means.outer_iter())
        .skip(n_seed)
    {
        Zip::from(&mut diff_2_sum)
            .and(&val)
            .and(&mean)
            .and(&prev_mean)
            .for_each(|s, &x, &m, &m_prev| *s += (x - m) * (x - m_prev));
        prev_mean = mean;
    }

    // Rounding in caller-supplied means can leave a zero total slightly negative.
    // NaN from a corrupted sample must survive.
    diff_2_sum.mapv_inplace(|s| if s < 0.0 { 0.0 } else { s });

    log::trace!("folded {} rows, n_vals = {n_vals}", batch.nrows() - n_seed);

    StatsState {
        mean: running_means.row(running_means.nrows() - 1).to_owned(),
        diff_2_sum,
        n_vals,
    }
}

/// Cumulative running means of `samples`, continuing a stream whose previous
/// `prior_n_vals` values sum to `prior_sum`.
pub fn running_means(
    samples: ArrayView2<f64>,
    prior_sum: ArrayView1<f64>,
    prior_n_vals: usize,
) -> Result<Array2<f64>, StatsError> {
    if prior_sum.len() != samples.ncols() {
        return Err(StatsError::ShapeMismatch {
            expected: (samples.nrows(), prior_sum.len()),
            found: samples.dim(),
        });
    }

    let mut sum = prior_sum.to_owned();
    let mut means = Array2::zeros(samples.raw_dim());
    for (i_val, (val, mut mean)) in samples
        .outer_iter()
        .zip(means.outer_iter_mut())
        .enumerate()
    {
        sum += &val;
        let n = (prior_n_vals + i_val + 1) as f64;
        Zip::from(&mut mean).and(&sum).for_each(|m, &s| *m = s / n);
    }
    Ok(means)
}

/// Column-wise mean, NaN without samples.
pub fn compute_mean(samples: ArrayView2<f64>) -> Array1<f64> {
    let n_vals = samples.nrows();
    if n_vals == 0 {
        return Array1::from_elem(samples.ncols(), f64::NAN);
    }
    samples.sum_axis(Axis(0)) / n_vals as f64
}

/// Column-wise two-pass sample variance, NaN with fewer than two samples.
pub fn compute_var(samples: ArrayView2<f64>) -> Array1<f64> {
    let n_vals = samples.nrows();
    if n_vals < 2 {
        return Array1::from_elem(samples.ncols(), f64::NAN);
    }
    let mean = compute_mean(samples);
    (&samples - &mean).mapv(|diff| diff.powi(2)).sum_axis(Axis(0)) / (n_vals - 1) as f64
}

/// Column-wise standard error of the mean of independent samples.
pub fn compute_sem(samples: ArrayView2<f64>) -> Array1<f64> {
    let n_vals = samples.nrows() as f64;
    compute_var(samples).mapv(|var| (var / n_vals).sqrt())
}
