//! Lag-window conversion and one-time input cropping.
//!
//! The lag window `[tstart, tstop)` is given in time units and converted to
//! sample offsets once, before any fitting starts. Cropping aligns the
//! predictor and response matrices so that kernel lag index 0 always
//! corresponds to the time offset `tstart`, letting the fitting loop index
//! lags as plain `0..kernel_len`.

use ndarray::{s, Array2};

use eb_types::{DataError, EbResult};

/// Converts a lag window in time units to `(i_start, kernel_len)` in samples.
pub fn lag_window(tstart: f64, tstop: f64, tstep: f64) -> EbResult<(isize, usize)> {
    if !tstart.is_finite() || !tstop.is_finite() {
        return Err(DataError::EmptyLagWindow { tstart, tstop }.into());
    }
    let i_start = (tstart / tstep).round() as isize;
    let i_stop = (tstop / tstep).round() as isize;
    if i_stop <= i_start {
        return Err(DataError::EmptyLagWindow { tstart, tstop }.into());
    }
    Ok((i_start, (i_stop - i_start) as usize))
}

/// Crops response and predictor matrices so the kernel can be indexed by
/// `0..kernel_len` with lag 0 at `tstart`.
///
/// For `i_start < 0` the predictors lose their first `-i_start` samples and
/// the responses their last; for `i_start > 0` the predictors lose their
/// last `i_start` samples and the responses their first.
pub fn crop_lag_window(
    response: &Array2<f64>,
    predictors: &Array2<f64>,
    i_start: isize,
    kernel_len: usize,
) -> EbResult<(Array2<f64>, Array2<f64>)> {
    let samples = response.ncols();
    let shift = i_start.unsigned_abs();
    let remaining = samples.saturating_sub(shift);
    if kernel_len > remaining {
        return Err(DataError::LagWindowTooLong {
            kernel_len,
            samples: remaining,
        }
        .into());
    }

    let (response, predictors) = if i_start < 0 {
        (
            response.slice(s![.., ..samples - shift]).to_owned(),
            predictors.slice(s![.., shift..]).to_owned(),
        )
    } else if i_start > 0 {
        (
            response.slice(s![.., shift..]).to_owned(),
            predictors.slice(s![.., ..samples - shift]).to_owned(),
        )
    } else {
        (response.clone(), predictors.clone())
    };
    Ok((response, predictors))
}
