//! Signal containers and pre-fit scaling.
//!
//! A [`SignalSet`] holds the aligned response and predictor matrices for one
//! estimation run. [`SignalSet::scale`] produces the centered/scaled copies
//! the optimizer works in, together with the per-row offsets and factors
//! needed to map fitted kernels back to original units.

use ndarray::{Array1, Array2, ArrayViewMut1};
use serde::{Deserialize, Serialize};

use crate::cost::ErrorNorm;
use crate::errors::{DataError, EbResult};

/// Aligned input signals for one estimation run.
///
/// Rows are signals, columns are samples; both matrices share the time axis
/// and the sampling step `tstep` (seconds per sample).
#[derive(Debug, Clone)]
pub struct SignalSet {
    response: Array2<f64>,
    predictors: Array2<f64>,
    tstep: f64,
}

impl SignalSet {
    pub fn new(response: Array2<f64>, predictors: Array2<f64>, tstep: f64) -> EbResult<Self> {
        if response.nrows() == 0 || response.ncols() == 0 {
            return Err(DataError::EmptyResponse.into());
        }
        if predictors.nrows() == 0 || predictors.ncols() == 0 {
            return Err(DataError::EmptyPredictors.into());
        }
        if response.ncols() != predictors.ncols() {
            return Err(DataError::LengthMismatch {
                response: response.ncols(),
                predictors: predictors.ncols(),
            }
            .into());
        }
        if !tstep.is_finite() || tstep <= 0.0 {
            return Err(DataError::InvalidSamplingStep { tstep }.into());
        }
        Ok(Self {
            response,
            predictors,
            tstep,
        })
    }

    pub fn response(&self) -> &Array2<f64> {
        &self.response
    }

    pub fn predictors(&self) -> &Array2<f64> {
        &self.predictors
    }

    pub fn tstep(&self) -> f64 {
        self.tstep
    }

    pub fn n_signals(&self) -> usize {
        self.response.nrows()
    }

    pub fn n_predictors(&self) -> usize {
        self.predictors.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.response.ncols()
    }

    /// Centers and scales each signal row, returning the scaled copies and
    /// the per-row statistics.
    ///
    /// Scale is the standard deviation for [`ErrorNorm::L2`] and the mean
    /// absolute value for [`ErrorNorm::L1`]. A constant row has scale zero
    /// and is divided by 1.0 instead, so it stays well-formed. With
    /// `scale_data` false the signals are copied unchanged and the
    /// statistics are the identity (mean 0, scale 1).
    pub fn scale(&self, error: ErrorNorm, scale_data: bool) -> ScaledSignals {
        let mut response = self.response.clone();
        let mut predictors = self.predictors.clone();
        let mut y_mean = Array1::zeros(self.n_signals());
        let mut y_scale = Array1::ones(self.n_signals());
        let mut x_mean = Array1::zeros(self.n_predictors());
        let mut x_scale = Array1::ones(self.n_predictors());

        if scale_data {
            for (i, row) in response.outer_iter_mut().enumerate() {
                let (mean, scale) = center_and_scale(row, error);
                y_mean[i] = mean;
                y_scale[i] = scale;
            }
            for (j, row) in predictors.outer_iter_mut().enumerate() {
                let (mean, scale) = center_and_scale(row, error);
                x_mean[j] = mean;
                x_scale[j] = scale;
            }
        }

        ScaledSignals {
            response,
            predictors,
            y_mean,
            y_scale,
            x_mean,
            x_scale,
        }
    }
}

/// Scaled working copies of the input signals plus the statistics used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaledSignals {
    pub response: Array2<f64>,
    pub predictors: Array2<f64>,
    pub y_mean: Array1<f64>,
    pub y_scale: Array1<f64>,
    pub x_mean: Array1<f64>,
    pub x_scale: Array1<f64>,
}

fn center_and_scale(mut row: ArrayViewMut1<'_, f64>, error: ErrorNorm) -> (f64, f64) {
    let mean = row.mean().unwrap_or(0.0);
    row.mapv_inplace(|v| v - mean);

    let scale = match error {
        ErrorNorm::L2 => row.mapv(|v| v * v).mean().unwrap_or(0.0).sqrt(),
        ErrorNorm::L1 => row.mapv(f64::abs).mean().unwrap_or(0.0),
    };
    // a constant row would otherwise divide by zero
    let scale = if scale == 0.0 { 1.0 } else { scale };
    row.mapv_inplace(|v| v / scale);
    (mean, scale)
}
