//! Stream-level properties of the aggregator.
//!
//! These tests drive the public API the way a live fetch loop does: random
//! batch sizes, state threaded between calls, state surviving serialization.

use livestats::stats::{self, History, StatsState, compute_mean, compute_sem, running_means};
use livestats::StatsError;
use ndarray::{Array, Array1, Array2, ArrayView1, s};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Normal, Uniform};

fn gaussian_stream(n_vals: usize, n_channels: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha12Rng::seed_from_u64(seed);
    let dist = Normal::new(5e-7, 2.5e-7).unwrap();
    Array::from_shape_fn((n_vals, n_channels), |_| dist.sample(&mut rng))
}

fn random_partition(n_vals: usize, max_batch: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha12Rng::seed_from_u64(seed);
    let dist = Uniform::new_inclusive(1, max_batch).unwrap();
    let mut sizes = Vec::new();
    let mut remaining = n_vals;
    while remaining > 0 {
        let size = dist.sample(&mut rng).min(remaining);
        sizes.push(size);
        remaining -= size;
    }
    sizes
}

/// Feed the stream batch by batch; `between` may transform the history
/// before it is passed back.
fn feed_with(
    samples: &Array2<f64>,
    batch_sizes: &[usize],
    mut between: impl FnMut(History) -> History,
) -> StatsState {
    let means = running_means(samples.view(), Array1::zeros(samples.ncols()).view(), 0).unwrap();
    let mut history = History::Fresh;
    let mut start = 0;
    for &size in batch_sizes {
        let end = start + size;
        let batch = samples.slice(s![start..end, ..]);
        let batch_means = means.slice(s![start..end, ..]);
        let state = if end < 2 {
            stats::absorb(batch, batch_means, end, &history).unwrap()
        } else {
            stats::update(batch, batch_means, end, &history)
                .unwrap()
                .state
        };
        history = between(History::Resumed(state));
        start = end;
    }
    history.state().cloned().unwrap()
}

fn assert_rel_close(found: ArrayView1<f64>, expected: ArrayView1<f64>, rel_tol: f64) {
    for (&f, &e) in found.iter().zip(expected.iter()) {
        assert!(
            (f - e).abs() <= rel_tol * e.abs(),
            "found {found}, expected {expected}"
        );
    }
}

// ============================================================================
// Closed-form equivalence
// ============================================================================

#[test]
fn random_partitions_match_two_pass() {
    let samples = gaussian_stream(5000, 10, 17);
    let expected_mean = compute_mean(samples.view());
    let expected_sem = compute_sem(samples.view());

    for seed in 0..5 {
        let sizes = random_partition(samples.nrows(), 100, seed);
        let state = feed_with(&samples, &sizes, |history| history);

        assert_eq!(state.n_vals(), 5000);
        assert_rel_close(state.mean(), expected_mean.view(), 1e-10);
        assert_rel_close(state.std_err().unwrap().view(), expected_sem.view(), 1e-8);
    }
}

#[test]
fn partitions_agree_with_each_other() {
    let samples = gaussian_stream(600, 4, 23);
    let reference = feed_with(&samples, &[600], |history| history);

    for sizes in [vec![1; 600], random_partition(600, 7, 1), random_partition(600, 250, 2)] {
        let state = feed_with(&samples, &sizes, |history| history);
        assert_rel_close(state.mean(), reference.mean(), 1e-12);
        assert_rel_close(
            state.std_err().unwrap().view(),
            reference.std_err().unwrap().view(),
            1e-9,
        );
    }
}

// ============================================================================
// Resumability
// ============================================================================

#[test]
fn history_survives_serialization() {
    let samples = gaussian_stream(300, 3, 5);
    let sizes = random_partition(300, 40, 9);

    let kept = feed_with(&samples, &sizes, |history| history);
    let replayed = feed_with(&samples, &sizes, |history| {
        let bytes = rmp_serde::to_vec(&history).unwrap();
        rmp_serde::from_slice(&bytes).unwrap()
    });

    assert_eq!(kept, replayed);
}

#[test]
fn independent_streams_run_concurrently() {
    let streams: Vec<_> = (0..4).map(|seed| gaussian_stream(400, 2, 100 + seed)).collect();

    let states: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = streams
            .iter()
            .enumerate()
            .map(|(i_stream, samples)| {
                scope.spawn(move || {
                    let sizes = random_partition(400, 30, i_stream as u64);
                    feed_with(samples, &sizes, |history| history)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (state, samples) in states.iter().zip(&streams) {
        assert_rel_close(
            state.std_err().unwrap().view(),
            compute_sem(samples.view()).view(),
            1e-9,
        );
    }
}

// ============================================================================
// Contract violations
// ============================================================================

#[test]
fn violations_leave_history_usable() {
    let samples = gaussian_stream(20, 2, 3);
    let means = running_means(samples.view(), Array1::zeros(2).view(), 0).unwrap();
    let history = History::Resumed(
        stats::update(
            samples.slice(s![..10, ..]),
            means.slice(s![..10, ..]),
            10,
            &History::Fresh,
        )
        .unwrap()
        .state,
    );
    let snapshot = history.clone();

    let empty = Array2::<f64>::zeros((0, 2));
    assert_eq!(
        stats::update(empty.view(), empty.view(), 10, &history),
        Err(StatsError::EmptyBatch)
    );
    assert!(matches!(
        stats::update(
            samples.slice(s![10.., ..1]),
            means.slice(s![10.., ..1]),
            20,
            &history
        ),
        Err(StatsError::ShapeMismatch { .. })
    ));
    assert_eq!(
        stats::update(
            samples.slice(s![10.., ..]),
            means.slice(s![10.., ..]),
            25,
            &history
        ),
        Err(StatsError::CountMismatch {
            expected: 20,
            found: 25,
        })
    );
    assert_eq!(history, snapshot);

    let result = stats::update(
        samples.slice(s![10.., ..]),
        means.slice(s![10.., ..]),
        20,
        &history,
    )
    .unwrap();
    assert_rel_close(
        result.std_err.view(),
        compute_sem(samples.view()).view(),
        1e-10,
    );
}
