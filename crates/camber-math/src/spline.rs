//! B-spline basis functions over an augmented knot vector.
//!
//! A [`BSplineBasis`] represents the full family of B-spline basis functions
//! of a given degree over a knot vector. Curves are expressed as linear
//! combinations of the basis values, so evaluation returns the whole vector
//! of basis values (or derivatives) at a point rather than a single spline.
//!
//! # Knot augmentation
//!
//! The constructor sorts the supplied knots and repeats the first and last
//! knot `degree` times. The multiplicity knots pin the boundary behaviour so
//! that the basis spans all polynomials of the degree over the whole domain
//! and the partition-of-unity property holds up to and including the right
//! boundary.
//!
//! # Example
//!
//! ```rust
//! use camber_math::spline::BSplineBasis;
//!
//! let basis = BSplineBasis::new(&[0.0, 1.0, 2.0, 3.0], 2).unwrap();
//! assert_eq!(basis.basis_count(), 5);
//!
//! let values = basis.evaluate(1.5).unwrap();
//! let total: f64 = values.iter().sum();
//! assert!((total - 1.0).abs() < 1e-12);
//! ```

use nalgebra::DVector;

use crate::error::{MathError, MathResult};

/// A family of B-spline basis functions over an augmented knot vector.
///
/// Evaluation uses the Cox–de Boor recursion. Degree-0 bases are indicator
/// functions of half-open knot intervals `[knot[i], knot[i+1])`, with the
/// final knot of the domain assigned to the last non-degenerate interval so
/// the basis stays defined at the right boundary.
#[derive(Debug, Clone)]
pub struct BSplineBasis {
    /// Augmented knot vector (sorted, boundary knots repeated `degree` times).
    knots: Vec<f64>,
    /// Polynomial degree of the basis functions.
    degree: usize,
}

impl BSplineBasis {
    /// Creates a basis family from a knot vector and degree.
    ///
    /// The knots are sorted and then augmented with `degree` repeated copies
    /// of the first and last knot.
    ///
    /// # Arguments
    ///
    /// * `knots` - Maturities delimiting the spline segments (at least 2)
    /// * `degree` - Polynomial degree (at least 1, at most `knots.len() - 1`)
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 2 knots are supplied, any knot is not
    /// finite, `degree < 1`, or `degree > knots.len() - 1`.
    pub fn new(knots: &[f64], degree: usize) -> MathResult<Self> {
        if knots.len() < 2 {
            return Err(MathError::insufficient_data(2, knots.len()));
        }
        if degree < 1 {
            return Err(MathError::invalid_input("degree must be at least 1"));
        }
        if degree > knots.len() - 1 {
            return Err(MathError::invalid_input(format!(
                "degree {} too high for {} knots",
                degree,
                knots.len()
            )));
        }
        if knots.iter().any(|k| !k.is_finite()) {
            return Err(MathError::invalid_input("knots must be finite"));
        }

        let mut sorted = knots.to_vec();
        sorted.sort_by(f64::total_cmp);

        let first = sorted[0];
        let last = sorted[sorted.len() - 1];

        let mut augmented = Vec::with_capacity(sorted.len() + 2 * degree);
        augmented.extend(std::iter::repeat(first).take(degree));
        augmented.extend_from_slice(&sorted);
        augmented.extend(std::iter::repeat(last).take(degree));

        Ok(Self {
            knots: augmented,
            degree,
        })
    }

    /// Returns the number of basis functions in the family.
    ///
    /// For an augmented knot vector of length `L` and degree `p` this is
    /// `L - 1 - p`.
    #[must_use]
    pub fn basis_count(&self) -> usize {
        self.knots.len() - 1 - self.degree
    }

    /// Returns the polynomial degree.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Returns the augmented knot vector.
    #[must_use]
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Returns the evaluation domain `(first, last)`.
    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    /// Evaluates all basis functions at `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` lies outside the knot domain.
    pub fn evaluate(&self, x: f64) -> MathResult<DVector<f64>> {
        self.evaluate_derivative(x, 0)
    }

    /// Evaluates the `order`-th derivative of all basis functions at `x`.
    ///
    /// Order 0 returns the basis values themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if `order` exceeds the degree or `x` lies outside
    /// the knot domain.
    pub fn evaluate_derivative(&self, x: f64, order: usize) -> MathResult<DVector<f64>> {
        if order > self.degree {
            return Err(MathError::invalid_input(format!(
                "derivative order {} exceeds degree {}",
                order, self.degree
            )));
        }
        let (min, max) = self.domain();
        if !x.is_finite() || x < min || x > max {
            return Err(MathError::extrapolation_not_allowed(x, min, max));
        }

        Ok(DVector::from_fn(self.basis_count(), |i, _| {
            if order == 0 {
                self.value(i, self.degree, x)
            } else {
                self.derivative(i, self.degree, order, x)
            }
        }))
    }

    /// Cox–de Boor value recursion for basis `i` of degree `p`.
    fn value(&self, i: usize, p: usize, x: f64) -> f64 {
        let k = &self.knots;

        if p == 0 {
            // Degenerate (multiplicity) interval carries no mass.
            if k[i] == k[i + 1] {
                return 0.0;
            }
            if x >= k[i] && x < k[i + 1] {
                return 1.0;
            }
            // The final knot belongs to the last non-degenerate interval,
            // keeping the basis defined at the right boundary.
            let last = k[k.len() - 1];
            if x == last && k[i + 1] == last {
                return 1.0;
            }
            return 0.0;
        }

        let d1 = k[i + p] - k[i];
        let w1 = if d1 == 0.0 { 0.0 } else { (x - k[i]) / d1 };

        let d2 = k[i + 1 + p] - k[i + 1];
        let w2 = if d2 == 0.0 { 0.0 } else { (x - k[i + 1]) / d2 };

        let mut result = 0.0;
        if w1 != 0.0 {
            result += w1 * self.value(i, p - 1, x);
        }
        if w2 != 1.0 {
            result += (1.0 - w2) * self.value(i + 1, p - 1, x);
        }
        result
    }

    /// Derivative recursion of order `d` for basis `i` of degree `p`.
    ///
    /// Requires `d <= p`; the entry check in [`evaluate_derivative`] together
    /// with the simultaneous decrement of `p` and `d` guarantees the
    /// recursion never reaches a degree-0 basis with `d > 0`.
    ///
    /// [`evaluate_derivative`]: BSplineBasis::evaluate_derivative
    fn derivative(&self, i: usize, p: usize, d: usize, x: f64) -> f64 {
        if d == 0 {
            return self.value(i, p, x);
        }
        debug_assert!(p >= 1, "derivative requested on degree-0 basis");

        let k = &self.knots;
        let scale = p as f64;

        let v1 = k[i + p] - k[i];
        let v1 = if v1 == 0.0 { 1.0 } else { v1 };

        let v2 = k[i + p + 1] - k[i + 1];
        let v2 = if v2 == 0.0 { 1.0 } else { v2 };

        scale / v1 * self.derivative(i, p - 1, d - 1, x)
            - scale / v2 * self.derivative(i + 1, p - 1, d - 1, x)
    }
}
