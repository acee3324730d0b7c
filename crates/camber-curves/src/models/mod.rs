//! Curve model variants and their common capability contract.
//!
//! A [`CurveModel`] owns a state vector and exposes the fitted curve as a
//! [`DiscountFunction`] of that state. The optional capabilities (linear
//! equality constraints, a quadratic regularizer, and a structural
//! covariance) are queried through `Option`-returning methods, so the
//! fitter and calibration loop can discover at run time what each sealed
//! variant provides instead of relying on structural typing.
//!
//! Variants:
//!
//! - [`SplineModel`]: log-discount B-spline with boundary constraints
//! - [`MeanReversionModel`]: multi-factor mean-reverting short-rate model
//!   with a closed-form discount function (calibratable covariance)
//! - [`DiscretizedForwardModel`]: piecewise-linear log-discount grid with a
//!   curvature regularizer (calibratable covariance)

mod discretized;
mod mean_reversion;
mod spline;

pub use discretized::DiscretizedForwardModel;
pub use mean_reversion::MeanReversionModel;
pub use spline::{BoundaryCondition, SplineModel};

use nalgebra::{DMatrix, DVector};

use crate::discount::DiscountFunction;
use crate::error::{CurveError, CurveResult};

/// Common contract for curve models.
///
/// The state vector is owned exclusively by the model: readers borrow it
/// through [`state`], and the fitter advances it through [`apply_step`].
/// No raw mutable alias is ever handed out.
///
/// [`state`]: CurveModel::state
/// [`apply_step`]: CurveModel::apply_step
pub trait CurveModel: DiscountFunction {
    /// Returns the state vector length.
    fn state_len(&self) -> usize;

    /// Borrows the current state vector.
    fn state(&self) -> &DVector<f64>;

    /// Replaces the state vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the length does not match [`state_len`].
    ///
    /// [`state_len`]: CurveModel::state_len
    fn set_state(&mut self, state: DVector<f64>) -> CurveResult<()>;

    /// Adds a Newton step to the state vector in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the length does not match [`state_len`].
    ///
    /// [`state_len`]: CurveModel::state_len
    fn apply_step(&mut self, delta: &DVector<f64>) -> CurveResult<()>;

    /// Returns the model's linear equality constraints `P x = q`, if any.
    fn constraints(&self) -> Option<(DMatrix<f64>, DVector<f64>)> {
        None
    }

    /// Returns the model's quadratic regularizer `H`, if any.
    fn quadratic(&self) -> Option<DMatrix<f64>> {
        None
    }

    /// Returns the model's structural covariance matrix, if any.
    fn covariance(&self) -> Option<&DMatrix<f64>> {
        None
    }

    /// Replaces the model's structural covariance matrix.
    ///
    /// # Errors
    ///
    /// Returns an error for model variants without a covariance capability,
    /// or when the supplied matrix has the wrong shape.
    fn set_covariance(&mut self, covariance: DMatrix<f64>) -> CurveResult<()> {
        let _ = covariance;
        Err(CurveError::unsupported_capability("covariance", self.info()))
    }

    /// Returns a short human-readable description of the model.
    fn info(&self) -> String;
}

/// Validates that `candidate` has the expected state length.
pub(crate) fn check_state_len(candidate: usize, expected: usize) -> CurveResult<()> {
    if candidate != expected {
        return Err(CurveError::invalid_argument(format!(
            "state vector has length {candidate}, expected {expected}"
        )));
    }
    Ok(())
}
