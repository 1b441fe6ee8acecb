//! Worker pool for parallel (signal × fold) fitting.
//!
//! A fixed set of worker threads pulls jobs from a bounded queue filled by a
//! dedicated feeder thread, so job production overlaps result collection.
//! Inputs are shared read-only behind an [`Arc`]; every worker owns its own
//! kernel and residual scratch, and results travel back over a bounded
//! channel. Workers exit on a terminate sentinel. On cancellation the feeder
//! stops enqueueing, drains the job queue so blocked workers unblock
//! promptly, and still delivers one sentinel per worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use ndarray::Array2;
use tracing::debug;

use eb_types::{internal_error, EbResult, ErrorNorm};

use crate::booster::boost_fold;
use crate::folds::Fold;

/// Capacity of the job and result queues.
const QUEUE_CAPACITY: usize = 200;

/// How long a blocked feeder send waits before re-checking cancellation.
const SEND_RETRY: Duration = Duration::from_millis(50);

/// Read-only inputs shared by all workers for one run.
#[derive(Debug)]
pub struct FitData {
    /// Scaled, lag-cropped response matrix (signals × time).
    pub response: Array2<f64>,
    /// Scaled, lag-cropped predictor matrix (predictors × time).
    pub predictors: Array2<f64>,
    /// Fold splits, shared by every signal.
    pub folds: Vec<Fold>,
    pub kernel_len: usize,
    pub delta: f64,
    pub min_delta: f64,
    pub error: ErrorNorm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Job {
    Fit { signal: usize, fold: usize },
    Terminate,
}

/// One fold outcome, delivered in arrival order.
#[derive(Debug)]
pub struct FoldResult {
    pub signal: usize,
    pub fold: usize,
    pub kernel: EbResult<Option<Array2<f64>>>,
}

/// Cooperative cancellation flag shared between the caller, the feeder, and
/// the result collector.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fixed-size pool of fold-fitting workers plus the job feeder.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    feeder: JoinHandle<()>,
    results: Receiver<FoldResult>,
}

impl WorkerPool {
    /// Spawns `n_workers` workers and the feeder for the full
    /// (signal × fold) job grid.
    pub fn spawn(
        data: Arc<FitData>,
        n_workers: usize,
        n_signals: usize,
        token: CancelToken,
    ) -> Self {
        let (job_tx, job_rx) = bounded::<Job>(QUEUE_CAPACITY);
        let (result_tx, result_rx) = bounded::<FoldResult>(QUEUE_CAPACITY);
        let n_folds = data.folds.len();

        let workers = (0..n_workers)
            .map(|_| {
                let data = Arc::clone(&data);
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                thread::spawn(move || worker_loop(data, job_rx, result_tx))
            })
            .collect();

        let feeder = thread::spawn(move || {
            feed_jobs(job_tx, job_rx, n_signals, n_folds, n_workers, token)
        });

        Self {
            workers,
            feeder,
            results: result_rx,
        }
    }

    /// Result channel for the collector loop.
    pub fn results(&self) -> &Receiver<FoldResult> {
        &self.results
    }

    /// Shuts the pool down and joins every thread.
    ///
    /// The result receiver is dropped before the workers are joined, so a
    /// worker blocked on a full result queue fails its send, moves on to the
    /// sentinel, and exits instead of stalling.
    pub fn shutdown(self) -> EbResult<()> {
        let WorkerPool {
            workers,
            feeder,
            results,
        } = self;

        drop(results);
        feeder
            .join()
            .map_err(|_| internal_error!("job feeder panicked"))?;
        for worker in workers {
            worker
                .join()
                .map_err(|_| internal_error!("pool worker panicked"))?;
        }
        Ok(())
    }
}

fn worker_loop(data: Arc<FitData>, jobs: Receiver<Job>, results: Sender<FoldResult>) {
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Fit { signal, fold } => {
                let kernel = boost_fold(
                    data.response.row(signal),
                    data.predictors.view(),
                    &data.folds[fold],
                    data.kernel_len,
                    data.delta,
                    data.min_delta,
                    data.error,
                )
                .map(|fit| fit.kernel);
                let result = FoldResult {
                    signal,
                    fold,
                    kernel,
                };
                if results.send(result).is_err() {
                    // collector is gone; no point fitting the rest
                    break;
                }
            }
            Job::Terminate => break,
        }
    }
}

/// Fills the job queue with the (signal × fold) grid, then one terminate
/// sentinel per worker. Stops filling as soon as the token is canceled and
/// drains whatever is still queued so the sentinels are seen promptly.
fn feed_jobs(
    job_tx: Sender<Job>,
    job_rx: Receiver<Job>,
    n_signals: usize,
    n_folds: usize,
    n_workers: usize,
    token: CancelToken,
) {
    'fill: for signal in 0..n_signals {
        for fold in 0..n_folds {
            let mut job = Job::Fit { signal, fold };
            loop {
                if token.is_canceled() {
                    break 'fill;
                }
                match job_tx.send_timeout(job, SEND_RETRY) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(returned)) => job = returned,
                    Err(SendTimeoutError::Disconnected(_)) => return,
                }
            }
        }
    }

    if token.is_canceled() {
        let mut drained = 0usize;
        while job_rx.try_recv().is_ok() {
            drained += 1;
        }
        debug!(drained, "run canceled, job queue drained");
    }

    for _ in 0..n_workers {
        let mut job = Job::Terminate;
        loop {
            match job_tx.send_timeout(job, SEND_RETRY) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(returned)) => job = returned,
                Err(SendTimeoutError::Disconnected(_)) => return,
            }
        }
    }
}
