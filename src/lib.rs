//! # livestats
//!
//! Resumable standard error of the mean for measurement data that streams in
//! batches of arbitrary size.
//!
//! The core is [`stats::update`]: it folds a batch of vector-valued samples,
//! together with the running means of the stream at every sample, into a
//! [`stats::StatsState`] and returns the per-channel standard error. The
//! state is threaded by the caller through [`stats::History`]; nothing is
//! kept between calls.
//!
//! ```
//! use livestats::stats::{self, History};
//! use ndarray::array;
//!
//! let batch = array![[1.0, 3.0], [3.0, 3.0]];
//! let means = array![[1.0, 3.0], [2.0, 3.0]];
//! let first = stats::update(batch.view(), means.view(), 2, &History::Fresh).unwrap();
//! assert_eq!(first.std_err, array![1.0, 0.0]);
//!
//! let batch = array![[5.0, 3.0]];
//! let means = array![[3.0, 3.0]];
//! let history = History::Resumed(first.state);
//! let second = stats::update(batch.view(), means.view(), 3, &history).unwrap();
//! assert_eq!(second.state.mean(), array![3.0, 3.0]);
//! ```
//!
//! The remaining modules drive the aggregator from a simulated live
//! acquisition: [`fetch`] hands out results, [`acquisition`] threads the
//! state through every poll and checkpoints it, and [`analysis`] checks a
//! finished run against the two-pass computation.

pub mod acquisition;
pub mod analysis;
pub mod config;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod model;
pub mod stats;
pub mod types;

pub use error::StatsError;
pub use stats::{History, StatsState, StatsUpdate, absorb, update};
