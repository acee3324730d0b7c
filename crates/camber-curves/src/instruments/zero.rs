//! Zero-rate (log-discount) instrument.

use nalgebra::DVector;

use super::CurveInstrument;
use crate::discount::DiscountFunction;
use crate::error::{CurveError, CurveResult};

/// Quotes the accumulated log-discount at maturity.
///
/// The implied rate is `F(T) = -ln df(T)`, the quantity curve models
/// interpolate in. Its gradient is `-grad df(T) / df(T)`.
#[derive(Debug, Clone, Copy)]
pub struct ZeroRate {
    /// Maturity in years.
    maturity: f64,
}

impl ZeroRate {
    /// Creates a zero-rate instrument.
    ///
    /// # Errors
    ///
    /// Returns an error if the maturity is not strictly positive.
    pub fn new(maturity: f64) -> CurveResult<Self> {
        if !maturity.is_finite() || maturity <= 0.0 {
            return Err(CurveError::non_positive_maturity(maturity));
        }
        Ok(Self { maturity })
    }
}

impl CurveInstrument for ZeroRate {
    fn maturity(&self) -> f64 {
        self.maturity
    }

    fn implied_rate(&self, discount: &dyn DiscountFunction) -> CurveResult<f64> {
        discount.log_discount(self.maturity)
    }

    fn implied_rate_with_gradient(
        &self,
        discount: &dyn DiscountFunction,
    ) -> CurveResult<(f64, DVector<f64>)> {
        discount.log_discount_with_gradient(self.maturity)
    }

    fn description(&self) -> String {
        format!("{:.2}Y zero (log-discount)", self.maturity)
    }
}
