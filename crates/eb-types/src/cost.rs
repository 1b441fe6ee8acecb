//! Cost functionals for the boosting search.
//!
//! Each variant bundles the three operations the optimizer needs: the total
//! cost of a residual buffer, a one-pass incremental evaluator for a step at
//! one (predictor, lag) coordinate, and an in-place commit of a chosen step.
//! The incremental evaluator and a recomputation after [`ErrorNorm::commit`]
//! must agree to floating tolerance.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::errors::DataError;

/// Error norm used for all train/test cost computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorNorm {
    /// Sum of absolute residuals.
    L1,
    /// Sum of squared residuals.
    L2,
}

impl Default for ErrorNorm {
    fn default() -> Self {
        Self::L2
    }
}

impl ErrorNorm {
    #[inline]
    fn point_cost(self, r: f64) -> f64 {
        match self {
            ErrorNorm::L1 => r.abs(),
            ErrorNorm::L2 => r * r,
        }
    }

    /// Total cost of a residual buffer.
    pub fn cost(self, resid: &Array1<f64>) -> f64 {
        resid.iter().map(|&r| self.point_cost(r)).sum()
    }

    /// Costs that would result from adding or subtracting `step` at one
    /// (predictor, lag) coordinate, without touching the residual buffer.
    ///
    /// Samples before `lag` have no history to draw on and contribute their
    /// current residual to both totals. Returns `(add_cost, sub_cost)`.
    pub fn delta_cost(
        self,
        resid: &Array1<f64>,
        x: ArrayView1<'_, f64>,
        lag: usize,
        step: f64,
    ) -> (f64, f64) {
        let n = resid.len();
        let mut add = 0.0;
        let mut sub = 0.0;
        for t in 0..lag.min(n) {
            let c = self.point_cost(resid[t]);
            add += c;
            sub += c;
        }
        for t in lag..n {
            let d = step * x[t - lag];
            add += self.point_cost(resid[t] - d);
            sub += self.point_cost(resid[t] + d);
        }
        (add, sub)
    }

    /// Applies a signed step at one (predictor, lag) coordinate to a residual
    /// buffer in place: `resid[t] -= step * x[t - lag]` for `t >= lag`.
    pub fn commit(self, resid: &mut Array1<f64>, x: ArrayView1<'_, f64>, lag: usize, step: f64) {
        let n = resid.len();
        for t in lag..n {
            resid[t] -= step * x[t - lag];
        }
    }
}

impl FromStr for ErrorNorm {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l1" => Ok(ErrorNorm::L1),
            "l2" => Ok(ErrorNorm::L2),
            _ => Err(DataError::UnknownErrorNorm {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ErrorNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorNorm::L1 => write!(f, "l1"),
            ErrorNorm::L2 => write!(f, "l2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_resid() -> Array1<f64> {
        array![0.5, -1.25, 2.0, -0.75, 1.5, 0.25, -2.5, 1.0]
    }

    fn sample_x() -> Array1<f64> {
        array![1.0, -0.5, 0.25, 2.0, -1.5, 0.75, 1.25, -1.0]
    }

    #[test]
    fn test_l2_cost_sums_squares() {
        let resid = array![1.0, -2.0, 3.0];
        assert!((ErrorNorm::L2.cost(&resid) - 14.0).abs() < 1e-12);
    }

    #[test]
    fn test_l1_cost_sums_abs() {
        let resid = array![1.0, -2.0, 3.0];
        assert!((ErrorNorm::L1.cost(&resid) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_delta_cost_matches_recompute_after_commit() {
        let resid = sample_resid();
        let x = sample_x();
        let step = 0.125;

        for norm in [ErrorNorm::L1, ErrorNorm::L2] {
            for lag in 0..5 {
                let (add, sub) = norm.delta_cost(&resid, x.view(), lag, step);

                let mut r_add = resid.clone();
                norm.commit(&mut r_add, x.view(), lag, step);
                assert!(
                    (add - norm.cost(&r_add)).abs() < 1e-10,
                    "add mismatch for {norm} lag {lag}"
                );

                let mut r_sub = resid.clone();
                norm.commit(&mut r_sub, x.view(), lag, -step);
                assert!(
                    (sub - norm.cost(&r_sub)).abs() < 1e-10,
                    "sub mismatch for {norm} lag {lag}"
                );
            }
        }
    }

    #[test]
    fn test_commit_leaves_samples_before_lag_untouched() {
        let mut resid = sample_resid();
        let before = resid.clone();
        ErrorNorm::L2.commit(&mut resid, sample_x().view(), 3, 0.5);

        for t in 0..3 {
            assert_eq!(resid[t], before[t]);
        }
        for t in 3..resid.len() {
            assert!((resid[t] - (before[t] - 0.5 * sample_x()[t - 3])).abs() < 1e-12);
        }
    }

    #[test]
    fn test_delta_cost_with_lag_beyond_buffer() {
        let resid = sample_resid();
        let current = ErrorNorm::L1.cost(&resid);
        let (add, sub) = ErrorNorm::L1.delta_cost(&resid, sample_x().view(), resid.len(), 0.5);

        assert!((add - current).abs() < 1e-12);
        assert!((sub - current).abs() < 1e-12);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("l1".parse::<ErrorNorm>().unwrap(), ErrorNorm::L1);
        assert_eq!("L2".parse::<ErrorNorm>().unwrap(), ErrorNorm::L2);
        assert_eq!(ErrorNorm::L2.to_string(), "l2");
        assert!("huber".parse::<ErrorNorm>().is_err());
    }
}
