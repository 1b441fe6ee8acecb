//! Run orchestration: from validated inputs to a finished [`BoostRecord`].
//!
//! One run fits every (signal × fold) combination, averages each signal's
//! fold kernels, scores the average against the full scaled signal, and
//! assembles the immutable result record. Fitting runs on the calling thread
//! when `worker_count` is 0 and on a [`WorkerPool`] otherwise; both paths
//! produce identical records for the same inputs.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::RecvTimeoutError;
use ndarray::{Array1, Array2};
use tracing::{debug, info};
use uuid::Uuid;

use eb_types::{
    internal_error, rescale_kernel, BoostConfig, BoostRecord, EbError, EbResult, SignalSet,
    RECORD_VERSION,
};

use crate::booster::boost_fold;
use crate::evaluate::{average_kernels, evaluate_kernel, FitStats};
use crate::folds::Fold;
use crate::pool::{CancelToken, FitData, WorkerPool};
use crate::prepare::{crop_lag_window, lag_window};

/// How often the result collector re-checks the cancellation token while
/// waiting for fold results.
const COLLECT_POLL: Duration = Duration::from_millis(50);

/// Fits one kernel per response signal over the lag window
/// `[tstart, tstop)`, given in the time units of the signal set's sampling
/// step.
pub fn boost(
    signals: &SignalSet,
    tstart: f64,
    tstop: f64,
    config: &BoostConfig,
) -> EbResult<BoostRecord> {
    boost_cancellable(signals, tstart, tstop, config, &CancelToken::new())
}

/// Like [`boost`], but checks `token` between units of work and returns
/// [`EbError::Canceled`] instead of a record once it is set.
pub fn boost_cancellable(
    signals: &SignalSet,
    tstart: f64,
    tstop: f64,
    config: &BoostConfig,
    token: &CancelToken,
) -> EbResult<BoostRecord> {
    let started = Instant::now();
    config.validate()?;
    let (i_start, kernel_len) = lag_window(tstart, tstop, signals.tstep())?;

    let scaled = signals.scale(config.error, config.scale_data);
    let (response, predictors) =
        crop_lag_window(&scaled.response, &scaled.predictors, i_start, kernel_len)?;
    let folds = Fold::split_all(response.ncols(), config.fold_count)?;

    let n_signals = response.nrows();
    info!(
        signals = n_signals,
        predictors = predictors.nrows(),
        samples = response.ncols(),
        kernel_len,
        folds = folds.len(),
        workers = config.worker_count,
        "starting boosting run"
    );

    let data = Arc::new(FitData {
        response,
        predictors,
        folds,
        kernel_len,
        delta: config.step_size,
        min_delta: config.effective_min_step(),
        error: config.error,
    });

    let averaged = if config.worker_count == 0 {
        fit_sequential(&data, token)?
    } else {
        fit_pooled(Arc::clone(&data), config.worker_count, token)?
    };

    let mut kernels = Vec::with_capacity(n_signals);
    let mut kernels_scaled = Vec::with_capacity(n_signals);
    let mut pearson_r = Array1::zeros(n_signals);
    let mut spearman_r = Array1::zeros(n_signals);
    let mut fit_error = Array1::zeros(n_signals);
    let mut degenerate = vec![false; n_signals];

    for (i, kernel) in averaged.into_iter().enumerate() {
        let (kernel, stats) = match kernel {
            Some(kernel) => {
                let stats = evaluate_kernel(
                    data.response.row(i),
                    data.predictors.view(),
                    &kernel,
                    config.error,
                );
                (kernel, stats)
            }
            None => (
                Array2::zeros((data.predictors.nrows(), kernel_len)),
                FitStats::degenerate_zero(),
            ),
        };
        pearson_r[i] = stats.pearson_r;
        spearman_r[i] = stats.spearman_r;
        fit_error[i] = stats.fit_error;
        degenerate[i] = stats.degenerate;
        kernels_scaled.push(rescale_kernel(&kernel, scaled.y_scale[i], &scaled.x_scale));
        kernels.push(kernel);
    }

    let record = BoostRecord {
        version: RECORD_VERSION,
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        kernels,
        kernels_scaled,
        pearson_r,
        spearman_r,
        fit_error,
        degenerate,
        run_time_seconds: started.elapsed().as_secs_f64(),
        tstart,
        tstop,
        tstep: signals.tstep(),
        config: config.clone(),
        y_mean: scaled.y_mean,
        y_scale: scaled.y_scale,
        x_mean: scaled.x_mean,
        x_scale: scaled.x_scale,
    };
    info!(
        run_time_seconds = record.run_time_seconds,
        "boosting run finished"
    );
    Ok(record)
}

/// Fits all (signal × fold) combinations on the calling thread, averaging
/// each signal's folds as they finish.
fn fit_sequential(data: &FitData, token: &CancelToken) -> EbResult<Vec<Option<Array2<f64>>>> {
    let n_signals = data.response.nrows();
    let mut averaged = Vec::with_capacity(n_signals);

    for signal in 0..n_signals {
        let mut fold_kernels = Vec::with_capacity(data.folds.len());
        for fold in &data.folds {
            if token.is_canceled() {
                return Err(EbError::Canceled);
            }
            let fit = boost_fold(
                data.response.row(signal),
                data.predictors.view(),
                fold,
                data.kernel_len,
                data.delta,
                data.min_delta,
                data.error,
            )?;
            fold_kernels.push(fit.kernel);
        }
        averaged.push(average_kernels(&fold_kernels));
        debug!(signal, "signal complete");
    }
    Ok(averaged)
}

/// Fits all (signal × fold) combinations on a worker pool. Each signal is
/// averaged as soon as its last fold result arrives; fold kernels are
/// dropped right after.
fn fit_pooled(
    data: Arc<FitData>,
    n_workers: usize,
    token: &CancelToken,
) -> EbResult<Vec<Option<Array2<f64>>>> {
    let n_signals = data.response.nrows();
    let n_folds = data.folds.len();
    let total = n_signals * n_folds;

    let pool = WorkerPool::spawn(Arc::clone(&data), n_workers, n_signals, token.clone());

    let mut slots: Vec<Vec<Option<Option<Array2<f64>>>>> = vec![vec![None; n_folds]; n_signals];
    let mut arrived = vec![0usize; n_signals];
    let mut averaged: Vec<Option<Array2<f64>>> = vec![None; n_signals];
    let mut received = 0usize;
    let mut failure: Option<EbError> = None;

    while received < total && !token.is_canceled() {
        let result = match pool.results().recv_timeout(COLLECT_POLL) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        received += 1;

        match result.kernel {
            Ok(kernel) => {
                slots[result.signal][result.fold] = Some(kernel);
                arrived[result.signal] += 1;
                if arrived[result.signal] == n_folds {
                    let fold_kernels: Vec<Option<Array2<f64>>> =
                        mem::take(&mut slots[result.signal]).into_iter().flatten().collect();
                    averaged[result.signal] = average_kernels(&fold_kernels);
                    debug!(signal = result.signal, "signal complete");
                }
            }
            Err(err) => {
                // first failure wins; stop the rest of the run
                failure = Some(err);
                token.cancel();
                break;
            }
        }
    }

    pool.shutdown()?;

    if let Some(err) = failure {
        return Err(err);
    }
    if token.is_canceled() {
        return Err(EbError::Canceled);
    }
    if received < total {
        return Err(internal_error!(
            "worker pool stopped after {received} of {total} fold results"
        ));
    }
    Ok(averaged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::apply_kernel;
    use eb_types::{DataError, ErrorNorm};
    use ndarray::array;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn convolved_set(h_true: &Array2<f64>, samples: usize, seed: u64) -> SignalSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let n_x = h_true.nrows();
        let x = Array2::from_shape_fn((n_x, samples), |_| rng.gen_range(-1.0..1.0));
        let mut y = Array2::zeros((1, samples));
        y.row_mut(0).assign(&apply_kernel(x.view(), h_true));
        SignalSet::new(y, x, 0.01).unwrap()
    }

    #[test]
    fn test_recovers_convolved_kernel_end_to_end() {
        let h_true = array![[0.0, 0.5, -0.3], [0.2, 0.0, 0.0]];
        let signals = convolved_set(&h_true, 600, 7);
        let config = BoostConfig::default().with_step_size(0.01).with_folds(5);

        let record = boost(&signals, 0.0, 0.03, &config).unwrap();

        assert_eq!(record.version, RECORD_VERSION);
        assert_eq!(record.n_signals(), 1);
        assert!(record.pearson_r[0] > 0.99);
        assert!(record.spearman_r[0] > 0.95);
        assert!(!record.degenerate[0]);

        let recovered = &record.kernels_scaled[0];
        assert_eq!(recovered.dim(), (2, 3));
        for (got, want) in recovered.iter().zip(h_true.iter()) {
            assert!(
                (got - want).abs() < 0.05,
                "recovered {got} too far from {want}"
            );
        }
    }

    #[test]
    fn test_pooled_run_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(11);
        let samples = 300;
        let x = Array2::from_shape_fn((2, samples), |_| rng.gen_range(-1.0..1.0));
        let mut y = Array2::zeros((2, samples));
        y.row_mut(0)
            .assign(&apply_kernel(x.view(), &array![[0.4, 0.0], [0.0, -0.2]]));
        y.row_mut(1)
            .assign(&apply_kernel(x.view(), &array![[0.0, 0.3], [0.1, 0.0]]));
        let signals = SignalSet::new(y, x, 0.01).unwrap();

        let base = BoostConfig::default().with_step_size(0.05).with_folds(4);
        let sequential = boost(&signals, 0.0, 0.02, &base.clone().with_workers(0)).unwrap();
        let pooled = boost(&signals, 0.0, 0.02, &base.with_workers(2)).unwrap();

        assert_eq!(sequential.kernels, pooled.kernels);
        assert_eq!(sequential.kernels_scaled, pooled.kernels_scaled);
        assert_eq!(sequential.pearson_r, pooled.pearson_r);
        assert_eq!(sequential.fit_error, pooled.fit_error);
        assert_eq!(sequential.degenerate, pooled.degenerate);
    }

    #[test]
    fn test_zero_response_is_degenerate_not_nan() {
        for error in [ErrorNorm::L2, ErrorNorm::L1] {
            for scale_data in [true, false] {
                let mut rng = StdRng::seed_from_u64(23);
                let x = Array2::from_shape_fn((2, 200), |_| rng.gen_range(-1.0..1.0));
                let y = Array2::zeros((1, 200));
                let signals = SignalSet::new(y, x, 0.01).unwrap();
                let config = BoostConfig::default()
                    .with_error(error)
                    .with_folds(4)
                    .with_scale_data(scale_data);

                let record = boost(&signals, 0.0, 0.03, &config).unwrap();

                assert!(record.degenerate[0]);
                assert_eq!(record.pearson_r[0], 0.0);
                assert_eq!(record.spearman_r[0], 0.0);
                assert!(record.kernels[0].iter().all(|&v| v == 0.0));
                assert!(record.pearson_r.iter().all(|v| v.is_finite()));
                assert!(record.fit_error.iter().all(|v| v.is_finite()));
            }
        }
    }

    #[test]
    fn test_canceled_token_aborts_both_paths() {
        let h_true = array![[0.3, -0.1]];
        let signals = convolved_set(&h_true, 200, 3);
        let token = CancelToken::new();
        token.cancel();

        for workers in [0, 2] {
            let config = BoostConfig::default().with_folds(4).with_workers(workers);
            let err = boost_cancellable(&signals, 0.0, 0.02, &config, &token).unwrap_err();
            assert!(matches!(err, EbError::Canceled));
        }
    }

    #[test]
    fn test_scale_disabled_keeps_kernels_in_signal_units() {
        let h_true = array![[0.4, 0.0, -0.2]];
        let signals = convolved_set(&h_true, 400, 19);
        let config = BoostConfig::default()
            .with_step_size(0.02)
            .with_folds(4)
            .with_scale_data(false);

        let record = boost(&signals, 0.0, 0.03, &config).unwrap();

        assert_eq!(record.kernels, record.kernels_scaled);
        assert!(record.y_scale.iter().all(|&s| s == 1.0));
        assert!(record.pearson_r[0] > 0.99);
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let h_true = array![[0.3]];
        let signals = convolved_set(&h_true, 50, 5);

        let bad_folds = BoostConfig::default().with_folds(0);
        assert!(matches!(
            boost(&signals, 0.0, 0.02, &bad_folds).unwrap_err(),
            EbError::Config(_)
        ));

        let config = BoostConfig::default().with_folds(4);
        assert!(matches!(
            boost(&signals, 0.1, 0.1, &config).unwrap_err(),
            EbError::Data(DataError::EmptyLagWindow { .. })
        ));
        assert!(matches!(
            boost(&signals, 0.0, 0.6, &config).unwrap_err(),
            EbError::Data(DataError::LagWindowTooLong { .. })
        ));
    }
}
