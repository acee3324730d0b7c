//! The discount function contract.
//!
//! Every curve model exposes its fitted curve through [`DiscountFunction`]:
//! a pure mapping from maturity to a discount factor `exp(-F(t))`, together
//! with the analytic gradient of the discount factor with respect to every
//! component of the model's state vector. Instruments price themselves off
//! this contract alone, which keeps them independent of any particular
//! model variant.

use nalgebra::DVector;

use crate::error::CurveResult;

/// A discount factor curve with analytic state gradients.
///
/// The gradient returned by [`discount_with_gradient`] has one entry per
/// state component, in state order; it is the partial derivative of the
/// discount factor itself (not of the log-discount).
///
/// [`discount_with_gradient`]: DiscountFunction::discount_with_gradient
pub trait DiscountFunction: Send + Sync {
    /// Returns the discount factor at maturity `t` (in years).
    ///
    /// # Errors
    ///
    /// Returns an error if `t` lies outside the model's domain.
    fn discount(&self, t: f64) -> CurveResult<f64>;

    /// Returns the discount factor at `t` together with its gradient with
    /// respect to the model's state vector.
    ///
    /// # Errors
    ///
    /// Returns an error if `t` lies outside the model's domain.
    fn discount_with_gradient(&self, t: f64) -> CurveResult<(f64, DVector<f64>)>;

    /// Returns the accumulated log-discount `F(t) = -ln df(t)`.
    fn log_discount(&self, t: f64) -> CurveResult<f64> {
        Ok(-self.discount(t)?.ln())
    }

    /// Returns the log-discount at `t` together with its state gradient.
    fn log_discount_with_gradient(&self, t: f64) -> CurveResult<(f64, DVector<f64>)> {
        let (df, gradient) = self.discount_with_gradient(t)?;
        Ok((-df.ln(), gradient * (-1.0 / df)))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Flat curve `df(t) = exp(-rate * t)` with a single-component state
    /// (the rate itself), used to exercise instrument pricing and gradient
    /// formulas against closed forms.
    pub struct FlatCurve {
        /// The flat continuously-compounded rate.
        pub rate: f64,
    }

    impl DiscountFunction for FlatCurve {
        fn discount(&self, t: f64) -> CurveResult<f64> {
            Ok((-self.rate * t).exp())
        }

        fn discount_with_gradient(&self, t: f64) -> CurveResult<(f64, DVector<f64>)> {
            let df = (-self.rate * t).exp();
            Ok((df, DVector::from_vec(vec![-t * df])))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FlatCurve;
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_log_discount_is_rate_times_t() {
        let curve = FlatCurve { rate: 0.05 };
        let f = curve.log_discount(2.0).unwrap();
        assert_relative_eq!(f, 0.10, epsilon = 1e-12);
    }

    #[test]
    fn test_log_discount_gradient() {
        // F = rate * t, so dF/drate = t.
        let curve = FlatCurve { rate: 0.05 };
        let (f, gradient) = curve.log_discount_with_gradient(3.0).unwrap();
        assert_relative_eq!(f, 0.15, epsilon = 1e-12);
        assert_relative_eq!(gradient[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_discount_gradient_matches_finite_difference() {
        let h = 1e-7;
        let up = FlatCurve { rate: 0.04 + h };
        let down = FlatCurve { rate: 0.04 - h };
        let curve = FlatCurve { rate: 0.04 };

        let (_, gradient) = curve.discount_with_gradient(5.0).unwrap();
        let numeric =
            (up.discount(5.0).unwrap() - down.discount(5.0).unwrap()) / (2.0 * h);
        assert_relative_eq!(gradient[0], numeric, epsilon = 1e-6);
    }
}
