//! Vanilla fixed-for-floating swap instrument.

use nalgebra::DVector;

use super::CurveInstrument;
use crate::discount::DiscountFunction;
use crate::error::{CurveError, CurveResult};

/// Default fixed-leg payment frequency in years (quarterly).
const DEFAULT_FREQUENCY: f64 = 0.25;

/// Quotes the par rate of a vanilla fixed-for-floating swap.
///
/// The fixed leg pays on a regular grid walked **backward** from maturity
/// in steps of the payment frequency; the accrual factor of each period is
/// `min(frequency, t)`, which sizes the stub period nearest time zero.
/// With a single floating payment worth `1 - df(T)`, the par rate is
///
/// ```text
/// rate = (1 - df(T)) / Σ min(frequency, t_i) · df(t_i)
/// ```
///
/// The gradient follows from the quotient rule, accumulating the discount
/// gradients at every accrual date plus maturity.
#[derive(Debug, Clone, Copy)]
pub struct Swap {
    /// Maturity in years.
    maturity: f64,
    /// Fixed-leg payment frequency in years.
    frequency: f64,
}

impl Swap {
    /// Creates a swap with the standard quarterly fixed leg.
    ///
    /// # Errors
    ///
    /// Returns an error if the maturity is not strictly positive.
    pub fn new(maturity: f64) -> CurveResult<Self> {
        Self::with_frequency(maturity, DEFAULT_FREQUENCY)
    }

    /// Creates a swap with an explicit fixed-leg frequency.
    ///
    /// # Arguments
    ///
    /// * `maturity` - Swap maturity in years
    /// * `frequency` - Fixed-leg period length in years
    ///
    /// # Errors
    ///
    /// Returns an error if the maturity is not strictly positive or the
    /// frequency is not strictly positive.
    pub fn with_frequency(maturity: f64, frequency: f64) -> CurveResult<Self> {
        if !maturity.is_finite() || maturity <= 0.0 {
            return Err(CurveError::non_positive_maturity(maturity));
        }
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(CurveError::invalid_argument(format!(
                "swap frequency must be positive, got {frequency}"
            )));
        }
        Ok(Self {
            maturity,
            frequency,
        })
    }

    /// Returns the fixed-leg payment frequency in years.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Returns the fixed-leg annuity `Σ min(frequency, t_i) · df(t_i)`.
    ///
    /// Exposed for PV01-style diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if any accrual date lies outside the curve domain.
    pub fn annuity(&self, discount: &dyn DiscountFunction) -> CurveResult<f64> {
        let mut annuity = 0.0;
        let mut t = self.maturity;
        while t > 0.0 {
            let accrual = self.frequency.min(t);
            annuity += accrual * discount.discount(t)?;
            t -= self.frequency;
        }
        Ok(annuity)
    }
}

impl CurveInstrument for Swap {
    fn maturity(&self) -> f64 {
        self.maturity
    }

    fn implied_rate(&self, discount: &dyn DiscountFunction) -> CurveResult<f64> {
        let annuity = self.annuity(discount)?;
        if annuity <= 0.0 {
            return Err(CurveError::invalid_value(format!(
                "swap annuity must be positive, got {annuity}"
            )));
        }
        Ok((1.0 - discount.discount(self.maturity)?) / annuity)
    }

    fn implied_rate_with_gradient(
        &self,
        discount: &dyn DiscountFunction,
    ) -> CurveResult<(f64, DVector<f64>)> {
        let (df_maturity, maturity_gradient) =
            discount.discount_with_gradient(self.maturity)?;

        let mut annuity = 0.0;
        let mut annuity_gradient = DVector::zeros(maturity_gradient.len());
        let mut t = self.maturity;
        while t > 0.0 {
            let accrual = self.frequency.min(t);
            let (df, gradient) = discount.discount_with_gradient(t)?;
            annuity += accrual * df;
            annuity_gradient += gradient * accrual;
            t -= self.frequency;
        }

        if annuity <= 0.0 {
            return Err(CurveError::invalid_value(format!(
                "swap annuity must be positive, got {annuity}"
            )));
        }

        let rate = (1.0 - df_maturity) / annuity;
        // Quotient rule on (1 - df(T)) / annuity.
        let gradient =
            maturity_gradient * (-1.0 / annuity) - annuity_gradient * (rate / annuity);

        Ok((rate, gradient))
    }

    fn description(&self) -> String {
        format!(
            "{:.2}Y swap (fixed leg every {:.2}Y)",
            self.maturity, self.frequency
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::testing::FlatCurve;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(Swap::new(0.0).is_err());
        assert!(Swap::new(-5.0).is_err());
        assert!(Swap::with_frequency(5.0, 0.0).is_err());
        assert!(Swap::with_frequency(5.0, -0.25).is_err());
    }

    #[test]
    fn test_annuity_on_flat_curve() {
        let curve = FlatCurve { rate: 0.03 };
        let swap = Swap::new(1.0).unwrap();

        let expected: f64 = [0.25, 0.5, 0.75, 1.0]
            .iter()
            .map(|&t: &f64| 0.25 * (-0.03 * t).exp())
            .sum();
        assert_relative_eq!(swap.annuity(&curve).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_stub_accrual_for_broken_maturity() {
        // 0.6y swap: payments at 0.6 and 0.35 with full accrual, stub of
        // 0.10 at t = 0.10.
        let curve = FlatCurve { rate: 0.0 };
        let swap = Swap::new(0.6).unwrap();

        // Flat zero rate makes every df 1, so the annuity is the sum of
        // the accrual factors.
        let annuity = swap.annuity(&curve).unwrap();
        assert_relative_eq!(annuity, 0.25 + 0.25 + 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_par_rate_close_to_flat_rate() {
        let rate = 0.03;
        let curve = FlatCurve { rate };
        let swap = Swap::new(5.0).unwrap();

        let implied = swap.implied_rate(&curve).unwrap();
        // Quarterly compounding puts the par rate within a couple of basis
        // points of the continuous rate.
        assert_relative_eq!(implied, rate, epsilon = 2e-4);
    }

    #[test]
    fn test_par_rate_converges_with_frequency() {
        let rate = 0.03;
        let curve = FlatCurve { rate };

        let quarterly = Swap::new(5.0).unwrap().implied_rate(&curve).unwrap();
        let fine = Swap::with_frequency(5.0, 1.0 / 64.0)
            .unwrap()
            .implied_rate(&curve)
            .unwrap();

        assert!((fine - rate).abs() < (quarterly - rate).abs());
        assert_relative_eq!(fine, rate, epsilon = 1e-5);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let h = 1e-7;
        let curve = FlatCurve { rate: 0.04 };
        let up = FlatCurve { rate: 0.04 + h };
        let down = FlatCurve { rate: 0.04 - h };
        let swap = Swap::new(3.0).unwrap();

        let (_, gradient) = swap.implied_rate_with_gradient(&curve).unwrap();
        let numeric =
            (swap.implied_rate(&up).unwrap() - swap.implied_rate(&down).unwrap()) / (2.0 * h);
        assert_relative_eq!(gradient[0], numeric, epsilon = 1e-6);
    }
}
