// Boosting estimator for sparse temporal response kernels

pub mod booster;
pub mod estimator;
pub mod evaluate;
pub mod folds;
pub mod pool;
pub mod prepare;

pub use booster::{boost_fold, FoldFit, StopReason};
pub use estimator::{boost, boost_cancellable};
pub use evaluate::{apply_kernel, average_kernels, evaluate_kernel, pearson, spearman, FitStats};
pub use folds::Fold;
pub use pool::{CancelToken, FitData, FoldResult, WorkerPool};
pub use prepare::{crop_lag_window, lag_window};
