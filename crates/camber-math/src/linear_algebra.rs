//! Dense linear algebra utilities.
//!
//! This module provides the linear-system routines the curve fitter needs:
//! a direct solver with partial pivoting and a matrix inverse built on it.
//! The KKT systems assembled by the fitter carry a zero diagonal block, so
//! pivoting is required rather than optional.

use nalgebra::{DMatrix, DVector};

use crate::error::{MathError, MathResult};

/// Pivot magnitude below which a matrix is treated as singular.
const PIVOT_TOLERANCE: f64 = 1e-13;

/// Solves the linear system `A x = b` by Gaussian elimination with
/// partial pivoting.
///
/// # Arguments
///
/// * `a` - Square coefficient matrix
/// * `b` - Right-hand side vector of matching length
///
/// # Errors
///
/// Returns [`MathError::DimensionMismatch`] when the shapes are
/// incompatible and [`MathError::SingularMatrix`] when elimination meets a
/// pivot below tolerance.
pub fn solve_linear_system(a: &DMatrix<f64>, b: &DVector<f64>) -> MathResult<DVector<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return Err(MathError::DimensionMismatch {
            rows1: a.nrows(),
            cols1: a.ncols(),
            rows2: b.len(),
            cols2: 1,
        });
    }
    if n == 0 {
        return Ok(DVector::zeros(0));
    }

    // Augmented matrix [A | b].
    let mut aug = DMatrix::zeros(n, n + 1);
    aug.view_mut((0, 0), (n, n)).copy_from(a);
    aug.set_column(n, b);

    // Forward elimination with partial pivoting.
    for k in 0..n {
        let mut max_row = k;
        for i in k + 1..n {
            if aug[(i, k)].abs() > aug[(max_row, k)].abs() {
                max_row = i;
            }
        }
        if max_row != k {
            aug.swap_rows(k, max_row);
        }

        if aug[(k, k)].abs() < PIVOT_TOLERANCE {
            return Err(MathError::SingularMatrix);
        }

        for i in k + 1..n {
            let factor = aug[(i, k)] / aug[(k, k)];
            if factor == 0.0 {
                continue;
            }
            for j in k..=n {
                aug[(i, j)] -= factor * aug[(k, j)];
            }
        }
    }

    // Back substitution.
    let mut x = DVector::zeros(n);
    for i in (0..n).rev() {
        let mut sum = aug[(i, n)];
        for j in i + 1..n {
            sum -= aug[(i, j)] * x[j];
        }
        x[i] = sum / aug[(i, i)];
    }

    Ok(x)
}

/// Inverts a square matrix by solving against the identity column by column.
///
/// # Errors
///
/// Returns [`MathError::SingularMatrix`] when the matrix is not invertible
/// and [`MathError::DimensionMismatch`] when it is not square.
pub fn invert_matrix(a: &DMatrix<f64>) -> MathResult<DMatrix<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(MathError::DimensionMismatch {
            rows1: a.nrows(),
            cols1: a.ncols(),
            rows2: a.ncols(),
            cols2: a.nrows(),
        });
    }

    let mut inverse = DMatrix::zeros(n, n);
    for j in 0..n {
        let mut unit = DVector::zeros(n);
        unit[j] = 1.0;
        let column = solve_linear_system(a, &unit)?;
        inverse.set_column(j, &column);
    }

    Ok(inverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_simple_system() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_vec(vec![5.0, 5.0]);

        let x = solve_linear_system(&a, &b).unwrap();

        assert_relative_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_requires_pivoting() {
        // Zero leading pivot; solvable only with row exchange.
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let b = DVector::from_vec(vec![3.0, 7.0]);

        let x = solve_linear_system(&a, &b).unwrap();

        assert_relative_eq!(x[0], 7.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_saddle_point_system() {
        // KKT-shaped system with a zero lower-right block.
        let a = DMatrix::from_row_slice(
            3,
            3,
            &[
                2.0, 0.0, 1.0, //
                0.0, 2.0, 1.0, //
                1.0, 1.0, 0.0,
            ],
        );
        let b = DVector::from_vec(vec![0.0, 0.0, 1.0]);

        let x = solve_linear_system(&a, &b).unwrap();

        // Minimizer of x1^2 + x2^2 subject to x1 + x2 = 1.
        assert_relative_eq!(x[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_matrix_fails() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);

        assert!(matches!(
            solve_linear_system(&a, &b),
            Err(MathError::SingularMatrix)
        ));
    }

    #[test]
    fn test_dimension_mismatch_fails() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);

        assert!(matches!(
            solve_linear_system(&a, &b),
            Err(MathError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_invert_round_trip() {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 2.0]);

        let inv = invert_matrix(&a).unwrap();
        let product = &a * &inv;

        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(product[(i, j)], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_invert_singular_fails() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(invert_matrix(&a).is_err());
    }
}
