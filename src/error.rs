use thiserror::Error;

/// Caller-contract violations detected by the aggregator.
///
/// Every variant is raised before any arithmetic takes place, so the
/// caller's previous [`History`](crate::stats::History) stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("batch must contain at least one sample")]
    EmptyBatch,

    #[error("array shape must be {expected:?}, but is {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("number of values must be at least {min}, but is {n_vals}")]
    InvalidSampleSize { n_vals: usize, min: usize },

    #[error("number of values must be {expected}, but is {found}")]
    CountMismatch { expected: usize, found: usize },
}
