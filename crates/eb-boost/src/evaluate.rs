//! Kernel application and fit evaluation.
//!
//! After cross-validation, the surviving fold kernels are averaged in fold
//! order and the averaged kernel is scored against the observed signal. The
//! first `kernel_len - 1` samples are excluded from scoring because the
//! predicted signal has incomplete history there.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

use eb_types::ErrorNorm;

/// Fit statistics for one response signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitStats {
    pub pearson_r: f64,
    pub spearman_r: f64,
    pub fit_error: f64,
    pub degenerate: bool,
}

impl FitStats {
    /// Statistics reported for a signal whose search never beat the zero
    /// kernel. Exactly zero, never NaN.
    pub fn degenerate_zero() -> Self {
        Self {
            pearson_r: 0.0,
            spearman_r: 0.0,
            fit_error: 0.0,
            degenerate: true,
        }
    }
}

/// Predicts the response by convolving each predictor with its kernel row
/// and summing across predictors. The prediction is truncated to the length
/// of the time axis.
pub fn apply_kernel(x: ArrayView2<'_, f64>, h: &Array2<f64>) -> Array1<f64> {
    let n = x.ncols();
    let mut out = Array1::zeros(n);
    for (x_row, h_row) in x.outer_iter().zip(h.outer_iter()) {
        for (lag, &coef) in h_row.iter().enumerate() {
            if coef == 0.0 {
                continue;
            }
            for t in lag..n {
                out[t] += coef * x_row[t - lag];
            }
        }
    }
    out
}

/// Pearson correlation coefficient. NaN when either input has zero variance.
pub fn pearson(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return f64::NAN;
    }
    let mean_a = a.mean().unwrap_or(0.0);
    let mean_b = b.mean().unwrap_or(0.0);
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&ai, &bi) in a.iter().zip(b.iter()) {
        let da = ai - mean_a;
        let db = bi - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    cov / (var_a * var_b).sqrt()
}

/// Spearman rank correlation with ties assigned their average rank.
pub fn spearman(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return f64::NAN;
    }
    let ranks_a = ranks(a);
    let ranks_b = ranks(b);
    pearson(ranks_a.view(), ranks_b.view())
}

fn ranks(values: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        values[i]
            .partial_cmp(&values[j])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = Array1::zeros(n);
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // average rank for the tie group, 1-based
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Scores a fitted kernel against one observed response signal.
///
/// A non-finite correlation (constant observed or predicted span) is
/// reported as exactly zero with the degenerate flag set, so downstream
/// arrays stay well-formed.
pub fn evaluate_kernel(
    y: ArrayView1<'_, f64>,
    x: ArrayView2<'_, f64>,
    h: &Array2<f64>,
    error: ErrorNorm,
) -> FitStats {
    let predicted = apply_kernel(x, h);
    let skip = h.ncols().saturating_sub(1);
    let y_eval = y.slice(s![skip..]);
    let p_eval = predicted.slice(s![skip..]);

    let r = pearson(y_eval, p_eval);
    let rank_r = spearman(y_eval, p_eval);
    let resid = &y_eval - &p_eval;
    let fit_error = error.cost(&resid);
    let degenerate = !r.is_finite() || !rank_r.is_finite();

    FitStats {
        pearson_r: if r.is_finite() { r } else { 0.0 },
        spearman_r: if rank_r.is_finite() { rank_r } else { 0.0 },
        fit_error,
        degenerate,
    }
}

/// Element-wise average of the fold kernels that reported one, combined in
/// slice (fold) order. Returns `None` when every fold reported no kernel.
pub fn average_kernels(kernels: &[Option<Array2<f64>>]) -> Option<Array2<f64>> {
    let mut sum: Option<Array2<f64>> = None;
    let mut count = 0usize;
    for kernel in kernels.iter().flatten() {
        match &mut sum {
            Some(acc) => *acc += kernel,
            None => sum = Some(kernel.clone()),
        }
        count += 1;
    }
    sum.map(|mut acc| {
        acc /= count as f64;
        acc
    })
}
