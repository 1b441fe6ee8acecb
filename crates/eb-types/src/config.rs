//! Estimation run configuration.

use serde::{Deserialize, Serialize};

use crate::config_error;
use crate::cost::ErrorNorm;
use crate::errors::EbResult;

/// Configuration for a boosting estimation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostConfig {
    /// Magnitude added to or subtracted from one kernel coefficient per
    /// accepted iteration.
    pub step_size: f64,

    /// Floor for step halving when training cost stops improving. `None`
    /// means the step size is never halved (floor equals `step_size`).
    pub min_step_size: Option<f64>,

    /// Error norm used for all cost computations.
    pub error: ErrorNorm,

    /// Number of pool workers. 0 runs the estimation sequentially on the
    /// calling thread.
    pub worker_count: usize,

    /// Number of cross-validation folds.
    pub fold_count: usize,

    /// Center and scale signals before fitting.
    pub scale_data: bool,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            step_size: 0.005,
            min_step_size: None,
            error: ErrorNorm::L2,
            worker_count: 0,
            fold_count: 10,
            scale_data: true,
        }
    }
}

impl BoostConfig {
    pub fn with_step_size(mut self, step: f64) -> Self {
        self.step_size = step;
        self
    }

    pub fn with_min_step_size(mut self, min_step: f64) -> Self {
        self.min_step_size = Some(min_step);
        self
    }

    pub fn with_error(mut self, error: ErrorNorm) -> Self {
        self.error = error;
        self
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.worker_count = n;
        self
    }

    pub fn with_folds(mut self, k: usize) -> Self {
        self.fold_count = k;
        self
    }

    pub fn with_scale_data(mut self, scale: bool) -> Self {
        self.scale_data = scale;
        self
    }

    /// Step-halving floor actually used by the search.
    pub fn effective_min_step(&self) -> f64 {
        self.min_step_size.unwrap_or(self.step_size)
    }

    pub fn validate(&self) -> EbResult<()> {
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(config_error!(
                "step_size must be a positive finite number, got {}",
                self.step_size
            ));
        }
        if let Some(min_step) = self.min_step_size {
            if !min_step.is_finite() || min_step <= 0.0 {
                return Err(config_error!(
                    "min_step_size must be a positive finite number, got {}",
                    min_step
                ));
            }
            if min_step > self.step_size {
                return Err(config_error!(
                    "min_step_size {} exceeds step_size {}",
                    min_step,
                    self.step_size
                ));
            }
        }
        if self.fold_count == 0 {
            return Err(config_error!("fold_count must be at least 1"));
        }
        Ok(())
    }
}
