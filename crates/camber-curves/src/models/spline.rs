//! Log-discount B-spline curve model.

use camber_math::spline::BSplineBasis;
use nalgebra::{DMatrix, DVector};

use super::{check_state_len, CurveModel};
use crate::discount::DiscountFunction;
use crate::error::{CurveError, CurveResult};

/// A derivative boundary condition on the log-discount spline.
///
/// Each condition contributes one constraint row: the derivative of the
/// given order, evaluated at the given knot, must equal the target value.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryCondition {
    /// Knot at which the condition applies.
    pub knot: f64,
    /// Derivative order (1 to the spline degree).
    pub order: usize,
    /// Target value of the derivative.
    pub target: f64,
}

impl BoundaryCondition {
    /// Creates a zero-target condition, the common case.
    #[must_use]
    pub fn zero(knot: f64, order: usize) -> Self {
        Self {
            knot,
            order,
            target: 0.0,
        }
    }
}

/// Curve model interpolating the log-discount `F(t)` as a B-spline.
///
/// The knot vector is `[0, maturities...]` and the state holds the spline
/// coefficients, so `df(t) = exp(-basis(t) · x)`. The constraint set pins
/// `F(0) = 0` and adds `degree - 1` derivative boundary conditions; with
/// one instrument per interior knot the fitting system is exactly square.
#[derive(Debug, Clone)]
pub struct SplineModel {
    basis: BSplineBasis,
    state: DVector<f64>,
    conditions: Vec<BoundaryCondition>,
    constraint_matrix: DMatrix<f64>,
    constraint_rhs: DVector<f64>,
}

impl SplineModel {
    /// Creates a spline model over `[0, maturities...]` with the default
    /// boundary conditions.
    ///
    /// The default set contains `degree - 1` zero-target conditions of
    /// order 2, 2, 3, 3, ... alternating between the last and first knot;
    /// in the cubic case these are the natural-spline endpoint conditions.
    ///
    /// # Errors
    ///
    /// Returns an error if no maturities are given, any maturity is not
    /// strictly positive, or the basis construction rejects the knots.
    pub fn new(maturities: &[f64], degree: usize) -> CurveResult<Self> {
        let basis = Self::build_basis(maturities, degree)?;
        let (min, max) = basis.domain();

        let conditions = (0..degree.saturating_sub(1))
            .map(|k| {
                let order = (2 + k / 2).min(degree);
                let knot = if k % 2 == 0 { max } else { min };
                BoundaryCondition::zero(knot, order)
            })
            .collect();

        Self::from_parts(basis, conditions)
    }

    /// Creates a spline model with explicit boundary conditions.
    ///
    /// # Errors
    ///
    /// Returns an error if the condition count is not `degree - 1`, a
    /// condition's order is 0 or exceeds the degree, or a condition's knot
    /// lies outside the spline domain.
    pub fn with_conditions(
        maturities: &[f64],
        degree: usize,
        conditions: Vec<BoundaryCondition>,
    ) -> CurveResult<Self> {
        let basis = Self::build_basis(maturities, degree)?;

        if conditions.len() != degree - 1 {
            return Err(CurveError::invalid_argument(format!(
                "expected {} boundary conditions for degree {}, got {}",
                degree - 1,
                degree,
                conditions.len()
            )));
        }
        let (min, max) = basis.domain();
        for condition in &conditions {
            if condition.order == 0 || condition.order > degree {
                return Err(CurveError::invalid_argument(format!(
                    "boundary condition order {} invalid for degree {}",
                    condition.order, degree
                )));
            }
            if condition.knot < min || condition.knot > max {
                return Err(CurveError::tenor_out_of_range(condition.knot, min, max));
            }
        }

        Self::from_parts(basis, conditions)
    }

    fn build_basis(maturities: &[f64], degree: usize) -> CurveResult<BSplineBasis> {
        if maturities.is_empty() {
            return Err(CurveError::invalid_argument(
                "at least one maturity is required",
            ));
        }
        if maturities.iter().any(|m| !m.is_finite() || *m <= 0.0) {
            return Err(CurveError::invalid_argument(
                "maturities must be finite and positive",
            ));
        }

        let mut knots = Vec::with_capacity(maturities.len() + 1);
        knots.push(0.0);
        knots.extend_from_slice(maturities);

        Ok(BSplineBasis::new(&knots, degree)?)
    }

    fn from_parts(
        basis: BSplineBasis,
        conditions: Vec<BoundaryCondition>,
    ) -> CurveResult<Self> {
        let states = basis.basis_count();
        let rows = 1 + conditions.len();

        // F(0) = 0 plus one row per derivative boundary condition.
        let mut constraint_matrix = DMatrix::zeros(rows, states);
        let mut constraint_rhs = DVector::zeros(rows);

        constraint_matrix
            .row_mut(0)
            .copy_from(&basis.evaluate(0.0)?.transpose());

        for (index, condition) in conditions.iter().enumerate() {
            let row = basis.evaluate_derivative(condition.knot, condition.order)?;
            constraint_matrix
                .row_mut(index + 1)
                .copy_from(&row.transpose());
            constraint_rhs[index + 1] = condition.target;
        }

        Ok(Self {
            basis,
            state: DVector::zeros(states),
            conditions,
            constraint_matrix,
            constraint_rhs,
        })
    }

    /// Returns the underlying basis family.
    #[must_use]
    pub fn basis(&self) -> &BSplineBasis {
        &self.basis
    }

    /// Returns the boundary conditions in effect.
    #[must_use]
    pub fn conditions(&self) -> &[BoundaryCondition] {
        &self.conditions
    }
}

impl DiscountFunction for SplineModel {
    fn discount(&self, t: f64) -> CurveResult<f64> {
        let values = self.basis.evaluate(t)?;
        Ok((-values.dot(&self.state)).exp())
    }

    fn discount_with_gradient(&self, t: f64) -> CurveResult<(f64, DVector<f64>)> {
        let values = self.basis.evaluate(t)?;
        let df = (-values.dot(&self.state)).exp();
        Ok((df, values * -df))
    }
}

impl CurveModel for SplineModel {
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
        Some((self.constraint_matrix.clone(), self.constraint_rhs.clone()))
    }

    fn info(&self) -> String {
        let (min, max) = self.basis.domain();
        format!(
            "log-discount spline, degree {}, {} coefficients over [{:.2}, {:.2}]",
            self.basis.degree(),
            self.state.len(),
            min,
            max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_construction_validations() {
        assert!(SplineModel::new(&[], 2).is_err());
        assert!(SplineModel::new(&[-1.0, 2.0], 2).is_err());
        assert!(SplineModel::new(&[1.0, 2.0, 3.0], 2).is_ok());
    }

    #[test]
    fn test_default_conditions_count() {
        let model = SplineModel::new(&[1.0, 2.0, 5.0, 10.0], 3).unwrap();
        assert_eq!(model.conditions().len(), 2);
        // Natural-spline defaults: order 2 at both ends.
        assert_eq!(model.conditions()[0].order, 2);
        assert_relative_eq!(model.conditions()[0].knot, 10.0);
        assert_eq!(model.conditions()[1].order, 2);
        assert_relative_eq!(model.conditions()[1].knot, 0.0);
    }

    #[test]
    fn test_explicit_conditions_validated() {
        let conditions = vec![BoundaryCondition::zero(3.0, 2)];
        assert!(SplineModel::with_conditions(&[1.0, 2.0, 3.0], 2, conditions).is_ok());

        // Wrong count.
        assert!(SplineModel::with_conditions(&[1.0, 2.0, 3.0], 2, vec![]).is_err());
        // Order above the degree.
        let bad = vec![BoundaryCondition::zero(3.0, 3)];
        assert!(SplineModel::with_conditions(&[1.0, 2.0, 3.0], 2, bad).is_err());
        // Knot outside the domain.
        let bad = vec![BoundaryCondition::zero(4.0, 2)];
        assert!(SplineModel::with_conditions(&[1.0, 2.0, 3.0], 2, bad).is_err());
    }

    #[test]
    fn test_state_length_matches_basis_count() {
        let model = SplineModel::new(&[1.0, 2.0, 3.0], 2).unwrap();
        // 4 knots + 2 boundary repeats each side -> 8 augmented knots,
        // 8 - 1 - 2 = 5 basis functions.
        assert_eq!(model.state_len(), 5);
        assert_eq!(model.basis().basis_count(), 5);
    }

    #[test]
    fn test_zero_state_is_unit_discount() {
        let model = SplineModel::new(&[1.0, 5.0], 1).unwrap();
        assert_relative_eq!(model.discount(0.0).unwrap(), 1.0);
        assert_relative_eq!(model.discount(3.0).unwrap(), 1.0);
    }

    #[test]
    fn test_constraint_rows_shape() {
        let model = SplineModel::new(&[1.0, 2.0, 3.0], 2).unwrap();
        let (matrix, rhs) = model.constraints().unwrap();
        assert_eq!(matrix.nrows(), 2); // F(0) = 0 plus one condition
        assert_eq!(matrix.ncols(), 5);
        assert_eq!(rhs.len(), 2);
        assert_relative_eq!(rhs[0], 0.0);
    }

    #[test]
    fn test_discount_gradient_matches_finite_difference() {
        let mut model = SplineModel::new(&[1.0, 2.0, 3.0], 2).unwrap();
        let state = DVector::from_vec(vec![0.01, 0.02, 0.04, 0.07, 0.11]);
        model.set_state(state.clone()).unwrap();

        let t = 1.7;
        let (_, gradient) = model.discount_with_gradient(t).unwrap();

        let h = 1e-7;
        for i in 0..model.state_len() {
            let mut up = state.clone();
            up[i] += h;
            let mut down = state.clone();
            down[i] -= h;

            let mut bumped = model.clone();
            bumped.set_state(up).unwrap();
            let df_up = bumped.discount(t).unwrap();
            bumped.set_state(down).unwrap();
            let df_down = bumped.discount(t).unwrap();

            assert_relative_eq!(
                gradient[i],
                (df_up - df_down) / (2.0 * h),
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn test_apply_step_accumulates() {
        let mut model = SplineModel::new(&[1.0, 2.0], 1).unwrap();
        let delta = DVector::from_vec(vec![0.01, 0.02, 0.03]);
        model.apply_step(&delta).unwrap();
        model.apply_step(&delta).unwrap();
        assert_relative_eq!(model.state()[2], 0.06, epsilon = 1e-15);

        let wrong = DVector::from_vec(vec![0.01]);
        assert!(model.apply_step(&wrong).is_err());
    }

    #[test]
    fn test_out_of_domain_discount_fails() {
        let model = SplineModel::new(&[1.0, 2.0], 1).unwrap();
        assert!(model.discount(-0.5).is_err());
        assert!(model.discount(2.5).is_err());
    }
}
