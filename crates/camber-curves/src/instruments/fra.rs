//! Forward rate agreement instrument.

use nalgebra::DVector;

use super::CurveInstrument;
use crate::discount::DiscountFunction;
use crate::error::{CurveError, CurveResult};

/// Quotes the continuously-compounded zero yield to maturity.
///
/// The implied rate is `-ln df(T) / T`, the annualized log-discount.
#[derive(Debug, Clone, Copy)]
pub struct ForwardRateAgreement {
    /// Maturity in years.
    maturity: f64,
}

impl ForwardRateAgreement {
    /// Creates a forward rate agreement.
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

impl CurveInstrument for ForwardRateAgreement {
    fn maturity(&self) -> f64 {
        self.maturity
    }

    fn implied_rate(&self, discount: &dyn DiscountFunction) -> CurveResult<f64> {
        Ok(discount.log_discount(self.maturity)? / self.maturity)
    }

    fn implied_rate_with_gradient(
        &self,
        discount: &dyn DiscountFunction,
    ) -> CurveResult<(f64, DVector<f64>)> {
        let (log_discount, gradient) = discount.log_discount_with_gradient(self.maturity)?;
        Ok((
            log_discount / self.maturity,
            gradient / self.maturity,
        ))
    }

    fn description(&self) -> String {
        format!("{:.2}Y FRA", self.maturity)
    }
}
