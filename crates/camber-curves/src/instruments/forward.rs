//! Instantaneous forward rate instrument.

use nalgebra::DVector;

use super::CurveInstrument;
use crate::discount::DiscountFunction;
use crate::error::{CurveError, CurveResult};

/// Step used for the finite-difference forward (1/128 year).
const FORWARD_STEP: f64 = 1.0 / 128.0;

/// Quotes the instantaneous forward rate at maturity.
///
/// The rate is the finite-difference slope of the log-discount over the
/// interval `[T - Δ, T]` with a fixed step `Δ = 1/128` year:
/// `(F(T) - F(T-Δ)) / Δ`. The gradient differences the log-discount
/// gradients the same way.
#[derive(Debug, Clone, Copy)]
pub struct InstantaneousForward {
    /// Maturity in years.
    maturity: f64,
}

impl InstantaneousForward {
    /// Creates an instantaneous forward instrument.
    ///
    /// # Errors
    ///
    /// Returns an error if the maturity is not strictly positive. The
    /// maturity must also exceed the finite-difference step, or evaluation
    /// would query the curve at a negative tenor.
    pub fn new(maturity: f64) -> CurveResult<Self> {
        if !maturity.is_finite() || maturity <= 0.0 {
            return Err(CurveError::non_positive_maturity(maturity));
        }
        if maturity < FORWARD_STEP {
            return Err(CurveError::invalid_argument(format!(
                "maturity {maturity} is below the forward difference step {FORWARD_STEP}"
            )));
        }
        Ok(Self { maturity })
    }

    /// Returns the finite-difference step in years.
    #[must_use]
    pub fn step() -> f64 {
        FORWARD_STEP
    }
}

impl CurveInstrument for InstantaneousForward {
    fn maturity(&self) -> f64 {
        self.maturity
    }

    fn implied_rate(&self, discount: &dyn DiscountFunction) -> CurveResult<f64> {
        let start = discount.log_discount(self.maturity - FORWARD_STEP)?;
        let end = discount.log_discount(self.maturity)?;
        Ok((end - start) / FORWARD_STEP)
    }

    fn implied_rate_with_gradient(
        &self,
        discount: &dyn DiscountFunction,
    ) -> CurveResult<(f64, DVector<f64>)> {
        let (start, start_gradient) =
            discount.log_discount_with_gradient(self.maturity - FORWARD_STEP)?;
        let (end, end_gradient) = discount.log_discount_with_gradient(self.maturity)?;
        Ok((
            (end - start) / FORWARD_STEP,
            (end_gradient - start_gradient) / FORWARD_STEP,
        ))
    }

    fn description(&self) -> String {
        format!("{:.2}Y instantaneous forward", self.maturity)
    }
}
