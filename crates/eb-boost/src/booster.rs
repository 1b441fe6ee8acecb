//! Single-fold greedy coordinate-descent search.
//!
//! One call to [`boost_fold`] fits one candidate kernel for one
//! (signal, fold) pair. The search starts from a zero kernel and repeatedly
//! commits the signed step that most reduces the training cost, tracking the
//! held-out test cost of every visited kernel. The winner is the first
//! snapshot that reached the minimal test cost over the whole run; if that
//! snapshot is the zero kernel the fold reports no kernel at all.

use std::collections::VecDeque;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use tracing::debug;

use eb_types::{validation_error, DataError, EbResult, ErrorNorm, FoldError};

use crate::folds::Fold;

/// Hard cap on search iterations. Effectively unreachable; on hit the
/// best-so-far snapshot is returned instead of failing.
const MAX_BOOST_ITERATIONS: usize = 999_999;

/// Iterations that must pass before the test-plateau stop may fire.
const PLATEAU_MIN_ITERATIONS: usize = 10;

/// Why a fold search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Test cost exceeded both of the previous two iterations.
    TestPlateau,
    /// No step improved the training cost and the step size could not be
    /// halved any further.
    ConvergedTrain,
    /// A coefficient returned to its value from 2 or 3 snapshots back.
    Oscillation,
    /// The iteration cap was reached.
    IterationCap,
}

/// Outcome of one (signal, fold) search.
#[derive(Debug, Clone)]
pub struct FoldFit {
    /// Winning kernel, or `None` if the zero kernel had the best test cost.
    pub kernel: Option<Array2<f64>>,
    pub stop: StopReason,
    pub iterations: usize,
}

/// Fits one kernel for one fold of one response signal.
///
/// `y` is the full (lag-cropped) response row and `x` the matching predictor
/// matrix; `fold` selects the train/test ranges. `delta` is halved whenever
/// no step improves the training cost, down to `min_delta`.
pub fn boost_fold(
    y: ArrayView1<'_, f64>,
    x: ArrayView2<'_, f64>,
    fold: &Fold,
    kernel_len: usize,
    delta: f64,
    min_delta: f64,
    error: ErrorNorm,
) -> EbResult<FoldFit> {
    let samples = y.len();
    if x.ncols() != samples {
        return Err(DataError::LengthMismatch {
            response: samples,
            predictors: x.ncols(),
        }
        .into());
    }
    if kernel_len == 0 {
        return Err(validation_error!("kernel length must be at least 1"));
    }
    for range in fold.train.iter().chain(std::iter::once(&fold.test)) {
        if range.end > samples {
            return Err(FoldError::RangeOutOfBounds {
                end: range.end,
                samples,
            }
            .into());
        }
    }

    let n_x = x.nrows();

    // per-segment residual buffers; the kernel starts at zero, so the
    // residual starts as the signal itself
    let mut train_resid: Vec<Array1<f64>> = fold
        .train
        .iter()
        .map(|r| y.slice(s![r.start..r.end]).to_owned())
        .collect();
    let train_x: Vec<ArrayView2<'_, f64>> = fold
        .train
        .iter()
        .map(|r| x.slice(s![.., r.start..r.end]))
        .collect();
    let mut test_resid = vec![y.slice(s![fold.test.start..fold.test.end]).to_owned()];
    let test_x = vec![x.slice(s![.., fold.test.start..fold.test.end])];

    let mut h = Array2::<f64>::zeros((n_x, kernel_len));
    let mut delta = delta;

    // last 3 kernel snapshots, oldest first
    let mut snapshots: VecDeque<Array2<f64>> = VecDeque::with_capacity(3);
    // test costs of the previous two iterations
    let mut prev_test = f64::INFINITY;
    let mut prev_test2 = f64::INFINITY;

    let mut best_cost = f64::INFINITY;
    let mut best_iter = 0usize;
    let mut best_kernel: Option<Array2<f64>> = None;

    let mut iterations = 0usize;
    let mut stop = StopReason::IterationCap;

    for iter in 0..MAX_BOOST_ITERATIONS {
        iterations = iter + 1;

        if snapshots.len() == 3 {
            snapshots.pop_front();
        }
        snapshots.push_back(h.clone());

        let e_train: f64 = train_resid.iter().map(|r| error.cost(r)).sum();
        let e_test: f64 = test_resid.iter().map(|r| error.cost(r)).sum();

        if e_test < best_cost {
            best_cost = e_test;
            best_iter = iter;
            best_kernel = Some(h.clone());
        }

        // stop once the test cost has been worse than both of the previous
        // two iterations
        if iter > PLATEAU_MIN_ITERATIONS && e_test > prev_test && e_test > prev_test2 {
            stop = StopReason::TestPlateau;
            break;
        }
        prev_test2 = prev_test;
        prev_test = e_test;

        // best signed step over all (predictor, lag) coordinates; scan order
        // is predictor-major, lag-minor, add before subtract, first strict
        // minimum wins
        let mut best_step_cost = f64::INFINITY;
        let mut best_coord = (0usize, 0usize);
        let mut best_step = delta;
        for p in 0..n_x {
            for lag in 0..kernel_len {
                let mut add = 0.0;
                let mut sub = 0.0;
                for (resid, x_seg) in train_resid.iter().zip(&train_x) {
                    let (a, b) = error.delta_cost(resid, x_seg.row(p), lag, delta);
                    add += a;
                    sub += b;
                }
                let (cost, step) = if add > sub { (sub, -delta) } else { (add, delta) };
                if cost < best_step_cost {
                    best_step_cost = cost;
                    best_coord = (p, lag);
                    best_step = step;
                }
            }
        }

        // no strict improvement: halve the step and retry, or give up
        if best_step_cost >= e_train {
            delta *= 0.5;
            if delta >= min_delta {
                continue;
            }
            stop = StopReason::ConvergedTrain;
            break;
        }

        let (p, lag) = best_coord;
        h[[p, lag]] += best_step;

        // a coefficient returning to an earlier value means the search is
        // toggling between two solutions
        let len = snapshots.len();
        if iter >= 2 && h[[p, lag]] == snapshots[len - 2][[p, lag]] {
            stop = StopReason::Oscillation;
            break;
        }
        if iter >= 3 && h[[p, lag]] == snapshots[len - 3][[p, lag]] {
            stop = StopReason::Oscillation;
            break;
        }

        for (resid, x_seg) in train_resid.iter_mut().zip(&train_x) {
            error.commit(resid, x_seg.row(p), lag, best_step);
        }
        for (resid, x_seg) in test_resid.iter_mut().zip(&test_x) {
            error.commit(resid, x_seg.row(p), lag, best_step);
        }
    }

    debug!(
        fold = fold.index,
        iterations,
        best_iter,
        ?stop,
        "fold search finished"
    );

    let kernel = if best_iter == 0 { None } else { best_kernel };
    Ok(FoldFit {
        kernel,
        stop,
        iterations,
    })
}
