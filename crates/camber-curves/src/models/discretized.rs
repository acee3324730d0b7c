//! Discretized log-discount forward curve model.

use camber_math::linear_algebra::invert_matrix;
use nalgebra::{DMatrix, DVector};

use super::{check_state_len, CurveModel};
use crate::discount::DiscountFunction;
use crate::error::{CurveError, CurveResult};

/// Default variance assigned to each grid point before calibration.
const DEFAULT_GRID_VARIANCE: f64 = 1e-4;

/// Curve model holding the log-discount on an equally spaced grid.
///
/// The horizon `[0, T]` is divided into `n` equal intervals; the state is
/// the log-discount `F` at the `n + 1` grid points, with `F[0] = 0`
/// enforced as a linear constraint. Off-grid tenors interpolate `F`
/// linearly, which makes the discrete forward rate `(F[i+1] - F[i]) / h`
/// piecewise constant.
///
/// Market instruments alone under-determine the grid, so the model carries
/// a quadratic regularizer `H = Lᵀ Σ⁻¹ L`: `L` takes second differences of
/// `F` (the grid-step-scaled increments of the discrete forward rates) and
/// `Σ = L C Lᵀ` is their covariance implied by the structural covariance
/// `C` of the grid, the usual finite-difference transform between
/// log-discount and forward-rate covariance. Curvature is thereby charged
/// against how much the structural covariance says forwards actually move.
#[derive(Debug, Clone)]
pub struct DiscretizedForwardModel {
    /// Grid horizon in years.
    horizon: f64,
    /// Log-discount values at the grid points.
    state: DVector<f64>,
    /// Structural covariance of the grid values ((n+1) x (n+1)).
    covariance: DMatrix<f64>,
    /// Cached regularizer, rebuilt whenever the covariance changes.
    regularizer: DMatrix<f64>,
}

impl DiscretizedForwardModel {
    /// Creates a model over `[0, horizon]` with `intervals` equal steps
    /// and the default diagonal covariance.
    ///
    /// # Errors
    ///
    /// Returns an error if the horizon is not strictly positive or fewer
    /// than 2 intervals are requested.
    pub fn new(horizon: f64, intervals: usize) -> CurveResult<Self> {
        if !horizon.is_finite() || horizon <= 0.0 {
            return Err(CurveError::invalid_argument(format!(
                "horizon must be positive, got {horizon}"
            )));
        }
        if intervals < 2 {
            return Err(CurveError::invalid_argument(format!(
                "at least 2 intervals are required, got {intervals}"
            )));
        }

        let states = intervals + 1;
        let covariance = DMatrix::identity(states, states) * DEFAULT_GRID_VARIANCE;
        let regularizer = Self::build_regularizer(&covariance)?;

        Ok(Self {
            horizon,
            state: DVector::zeros(states),
            covariance,
            regularizer,
        })
    }

    /// Replaces the structural covariance at construction time.
    ///
    /// # Errors
    ///
    /// Returns an error if the covariance has the wrong shape or implies a
    /// singular second-difference covariance.
    pub fn with_covariance(mut self, covariance: DMatrix<f64>) -> CurveResult<Self> {
        self.set_covariance(covariance)?;
        Ok(self)
    }

    /// Returns the number of grid intervals.
    #[must_use]
    pub fn intervals(&self) -> usize {
        self.state.len() - 1
    }

    /// Returns the grid horizon in years.
    #[must_use]
    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    /// Returns the grid step in years.
    #[must_use]
    pub fn step(&self) -> f64 {
        self.horizon / self.intervals() as f64
    }

    /// Second-difference operator on a grid of `states` points.
    fn second_difference_operator(states: usize) -> DMatrix<f64> {
        let mut operator = DMatrix::zeros(states - 2, states);
        for row in 0..states - 2 {
            operator[(row, row)] = 1.0;
            operator[(row, row + 1)] = -2.0;
            operator[(row, row + 2)] = 1.0;
        }
        operator
    }

    fn build_regularizer(covariance: &DMatrix<f64>) -> CurveResult<DMatrix<f64>> {
        let operator = Self::second_difference_operator(covariance.nrows());
        let sigma = &operator * covariance * operator.transpose();
        let sigma_inverse = invert_matrix(&sigma)?;
        Ok(operator.transpose() * sigma_inverse * operator)
    }

    fn locate(&self, t: f64) -> CurveResult<(usize, f64)> {
        if !t.is_finite() || t < 0.0 || t > self.horizon {
            return Err(CurveError::tenor_out_of_range(t, 0.0, self.horizon));
        }
        let position = t / self.step();
        let mut index = position.floor() as usize;
        if index >= self.intervals() {
            // t == horizon lands in the last interval.
            index = self.intervals() - 1;
        }
        Ok((index, position - index as f64))
    }
}

impl DiscountFunction for DiscretizedForwardModel {
    fn discount(&self, t: f64) -> CurveResult<f64> {
        let (index, fraction) = self.locate(t)?;
        let log_discount =
            (1.0 - fraction) * self.state[index] + fraction * self.state[index + 1];
        Ok((-log_discount).exp())
    }

    fn discount_with_gradient(&self, t: f64) -> CurveResult<(f64, DVector<f64>)> {
        let (index, fraction) = self.locate(t)?;
        let log_discount =
            (1.0 - fraction) * self.state[index] + fraction * self.state[index + 1];
        let df = (-log_discount).exp();

        // The interpolation weight splits the sensitivity between the two
        // bracketing grid points.
        let mut gradient = DVector::zeros(self.state.len());
        gradient[index] = -(1.0 - fraction) * df;
        gradient[index + 1] = -fraction * df;

        Ok((df, gradient))
    }
}

impl CurveModel for DiscretizedForwardModel {
    fn state_len(&self) -> usize {
        self.state.len()
    }

    fn state(&self) -> &DVector<f64> {
        &self.state
    }

    fn set_state(&mut self, state: DVector<f64>) -> CurveResult<()> {
        check_state_len(state.len(), self.state.len())?;
        self.state = state;
        Ok(())
    }

    fn apply_step(&mut self, delta: &DVector<f64>) -> CurveResult<()> {
        check_state_len(delta.len(), self.state.len())?;
        self.state += delta;
        Ok(())
    }

    fn constraints(&self) -> Option<(DMatrix<f64>, DVector<f64>)> {
        // F(0) = 0.
        let mut matrix = DMatrix::zeros(1, self.state.len());
        matrix[(0, 0)] = 1.0;
        Some((matrix, DVector::zeros(1)))
    }

    fn quadratic(&self) -> Option<DMatrix<f64>> {
        Some(self.regularizer.clone())
    }

    fn covariance(&self) -> Option<&DMatrix<f64>> {
        Some(&self.covariance)
    }

    fn set_covariance(&mut self, covariance: DMatrix<f64>) -> CurveResult<()> {
        let states = self.state.len();
        if covariance.nrows() != states || covariance.ncols() != states {
            return Err(CurveError::invalid_argument(format!(
                "covariance is {}x{}, expected {states}x{states}",
                covariance.nrows(),
                covariance.ncols()
            )));
        }
        // Rebuild before committing so a degenerate covariance leaves the
        // model untouched.
        self.regularizer = Self::build_regularizer(&covariance)?;
        self.covariance = covariance;
        Ok(())
    }

    fn info(&self) -> String {
        format!(
            "discretized forward grid, {} intervals over [0, {:.2}]",
            self.intervals(),
            self.horizon
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_construction_validations() {
        assert!(DiscretizedForwardModel::new(0.0, 4).is_err());
        assert!(DiscretizedForwardModel::new(-1.0, 4).is_err());
        assert!(DiscretizedForwardModel::new(5.0, 1).is_err());
        assert!(DiscretizedForwardModel::new(5.0, 2).is_ok());
    }

    #[test]
    fn test_grid_geometry() {
        let model = DiscretizedForwardModel::new(10.0, 5).unwrap();
        assert_eq!(model.intervals(), 5);
        assert_eq!(model.state_len(), 6);
        assert_relative_eq!(model.step(), 2.0);
    }

    #[test]
    fn test_flat_rate_grid_reproduces_exponential() {
        // F[i] = r * t_i makes the interpolated curve exactly flat.
        let rate = 0.03;
        let mut model = DiscretizedForwardModel::new(5.0, 10).unwrap();
        let step = model.step();
        let state = DVector::from_fn(11, |i, _| rate * step * i as f64);
        model.set_state(state).unwrap();

        for &t in &[0.0, 0.25, 1.0, 2.3, 4.75, 5.0] {
            assert_relative_eq!(
                model.discount(t).unwrap(),
                (-rate * t).exp(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_out_of_range_tenor_fails() {
        let model = DiscretizedForwardModel::new(5.0, 10).unwrap();
        assert!(model.discount(-0.1).is_err());
        assert!(model.discount(5.1).is_err());
        assert!(matches!(
            model.discount(6.0),
            Err(CurveError::TenorOutOfRange { .. })
        ));
    }

    #[test]
    fn test_gradient_splits_between_bracketing_points() {
        let model = DiscretizedForwardModel::new(4.0, 4).unwrap();
        // t = 1.25 sits a quarter of the way into interval [1, 2].
        let (df, gradient) = model.discount_with_gradient(1.25).unwrap();

        assert_relative_eq!(gradient[1], -0.75 * df, epsilon = 1e-12);
        assert_relative_eq!(gradient[2], -0.25 * df, epsilon = 1e-12);
        for i in [0, 3, 4] {
            assert_relative_eq!(gradient[i], 0.0);
        }
    }

    #[test]
    fn test_constraint_pins_first_point() {
        let model = DiscretizedForwardModel::new(5.0, 4).unwrap();
        let (matrix, rhs) = model.constraints().unwrap();
        assert_eq!(matrix.nrows(), 1);
        assert_relative_eq!(matrix[(0, 0)], 1.0);
        assert_relative_eq!(rhs[0], 0.0);
    }

    #[test]
    fn test_second_difference_operator() {
        let operator = DiscretizedForwardModel::second_difference_operator(5);
        assert_eq!(operator.nrows(), 3);
        assert_eq!(operator.ncols(), 5);

        // Applied to a linear sequence the second differences vanish.
        let linear = DVector::from_fn(5, |i, _| 2.0 * i as f64 + 1.0);
        let curvature = &operator * linear;
        for i in 0..3 {
            assert_relative_eq!(curvature[i], 0.0);
        }
    }

    #[test]
    fn test_regularizer_is_symmetric_and_penalizes_curvature() {
        let model = DiscretizedForwardModel::new(5.0, 4).unwrap();
        let h = model.quadratic().unwrap();
        assert_eq!(h.nrows(), 5);
        assert_eq!(h.ncols(), 5);

        for i in 0..5 {
            for j in 0..5 {
                assert_relative_eq!(h[(i, j)], h[(j, i)], epsilon = 1e-9, max_relative = 1e-9);
            }
        }

        // Straight lines are free; kinks cost.
        let line = DVector::from_fn(5, |i, _| 0.01 * i as f64);
        assert_relative_eq!((&h * &line).dot(&line), 0.0, epsilon = 1e-9);

        let kinked = DVector::from_vec(vec![0.0, 0.01, 0.05, 0.02, 0.08]);
        assert!((&h * &kinked).dot(&kinked) > 1e-6);
    }

    #[test]
    fn test_covariance_shape_validated() {
        let mut model = DiscretizedForwardModel::new(5.0, 4).unwrap();
        assert!(model.set_covariance(DMatrix::identity(4, 4)).is_err());
        assert!(model
            .set_covariance(DMatrix::identity(5, 5) * 2e-4)
            .is_ok());
    }
}
