//! Covariance estimation for state-vector time series.
//!
//! Historical rate panels have gaps, so the estimator works
//! pairwise-complete: each covariance entry uses only the observations
//! where both components are finite. Missing values are carried as NaN and
//! never imputed.

use nalgebra::{DMatrix, DVector};

use crate::error::{MathError, MathResult};

/// Computes first differences of a vector time series.
///
/// Entry `k` of the result is `series[k+1] - series[k]`. NaN components
/// propagate into the difference, which the covariance estimator then
/// excludes pairwise.
///
/// # Errors
///
/// Returns an error if fewer than 2 observations are supplied or the
/// observations have inconsistent dimensions.
pub fn first_differences(series: &[DVector<f64>]) -> MathResult<Vec<DVector<f64>>> {
    if series.len() < 2 {
        return Err(MathError::insufficient_data(2, series.len()));
    }
    let dim = series[0].len();
    if series.iter().any(|row| row.len() != dim) {
        return Err(MathError::invalid_input(
            "observations have inconsistent dimensions",
        ));
    }

    Ok(series
        .windows(2)
        .map(|pair| &pair[1] - &pair[0])
        .collect())
}

/// Computes the unbiased sample covariance of a set of observations,
/// multiplied by `scale`.
///
/// Entry `(i, j)` is estimated from the observations where both components
/// `i` and `j` are finite, with means taken over that same pairwise-complete
/// subset. `scale` annualizes the result (250 for daily first differences).
///
/// # Errors
///
/// Returns an error if the observations are empty or dimensionally
/// inconsistent, or if some pair of components has fewer than 2 complete
/// observations.
pub fn sample_covariance(observations: &[DVector<f64>], scale: f64) -> MathResult<DMatrix<f64>> {
    if observations.is_empty() {
        return Err(MathError::insufficient_data(2, 0));
    }
    let dim = observations[0].len();
    if observations.iter().any(|row| row.len() != dim) {
        return Err(MathError::invalid_input(
            "observations have inconsistent dimensions",
        ));
    }
    if !scale.is_finite() || scale <= 0.0 {
        return Err(MathError::invalid_input("scale must be positive"));
    }

    let mut covariance = DMatrix::zeros(dim, dim);
    for i in 0..dim {
        for j in i..dim {
            let pairs: Vec<(f64, f64)> = observations
                .iter()
                .map(|row| (row[i], row[j]))
                .filter(|(a, b)| a.is_finite() && b.is_finite())
                .collect();

            if pairs.len() < 2 {
                return Err(MathError::insufficient_data(2, pairs.len()));
            }

            let count = pairs.len() as f64;
            let mean_i = pairs.iter().map(|(a, _)| a).sum::<f64>() / count;
            let mean_j = pairs.iter().map(|(_, b)| b).sum::<f64>() / count;

            let entry = pairs
                .iter()
                .map(|(a, b)| (a - mean_i) * (b - mean_j))
                .sum::<f64>()
                / (count - 1.0)
                * scale;

            covariance[(i, j)] = entry;
            covariance[(j, i)] = entry;
        }
    }

    Ok(covariance)
}
