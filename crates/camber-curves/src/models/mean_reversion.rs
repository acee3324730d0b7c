//! Multi-factor mean-reverting short-rate model.

use nalgebra::{DMatrix, DVector};

use super::{check_state_len, CurveModel};
use crate::discount::DiscountFunction;
use crate::error::{CurveError, CurveResult};

/// Default variance assigned to each factor before calibration.
const DEFAULT_FACTOR_VARIANCE: f64 = 1e-4;

/// Vasicek-type model with `n` mean-reverting factors.
///
/// Each factor `x_i` reverts at speed `k_i`; the state vector holds the
/// factor levels, optionally extended by the mean-reversion level `w` as an
/// extra fitted component. With `B(k, t) = (1 - e^{-kt}) / k` the discount
/// function has the closed form
///
/// ```text
/// df(t) = exp(-(w·t - A(t)/2 + Σ B(k_i, t)·x_i))
/// A(t)  = ΣΣ C[i][j]/(k_i·k_j) · (t - B(k_i,t) - B(k_j,t) + B(k_i+k_j,t))
/// ```
///
/// where `C` is the structural factor covariance. The covariance is the
/// calibratable parameter of this variant; with one instrument per factor
/// the fitting system is fully determined, so the model declares no
/// constraints and no regularizer.
#[derive(Debug, Clone)]
pub struct MeanReversionModel {
    /// Mean-reversion speeds, all strictly positive.
    speeds: Vec<f64>,
    /// Structural factor covariance (n x n).
    covariance: DMatrix<f64>,
    /// Mean-reversion level used when it is not part of the state.
    mean_level: f64,
    /// Whether the mean level is fitted as an extra state component.
    fit_mean_level: bool,
    /// Factor levels, optionally followed by the mean level.
    state: DVector<f64>,
}

impl MeanReversionModel {
    /// Creates a model from explicit speeds and factor covariance.
    ///
    /// # Errors
    ///
    /// Returns an error if no speeds are given, any speed is not strictly
    /// positive and finite, or the covariance is not `n x n`.
    pub fn new(speeds: Vec<f64>, covariance: DMatrix<f64>) -> CurveResult<Self> {
        if speeds.is_empty() {
            return Err(CurveError::invalid_argument(
                "at least one mean-reversion speed is required",
            ));
        }
        if speeds.iter().any(|k| !k.is_finite() || *k <= 0.0) {
            return Err(CurveError::invalid_argument(
                "mean-reversion speeds must be finite and positive",
            ));
        }
        let factors = speeds.len();
        if covariance.nrows() != factors || covariance.ncols() != factors {
            return Err(CurveError::invalid_argument(format!(
                "covariance is {}x{}, expected {factors}x{factors}",
                covariance.nrows(),
                covariance.ncols()
            )));
        }

        Ok(Self {
            speeds,
            covariance,
            mean_level: 0.0,
            fit_mean_level: false,
            state: DVector::zeros(factors),
        })
    }

    /// Creates a model whose factor half-lives equal the given maturities,
    /// with a small diagonal default covariance.
    ///
    /// # Errors
    ///
    /// Returns an error if any half-life is not strictly positive.
    pub fn from_half_lives(half_lives: &[f64]) -> CurveResult<Self> {
        if half_lives.iter().any(|h| !h.is_finite() || *h <= 0.0) {
            return Err(CurveError::invalid_argument(
                "half-lives must be finite and positive",
            ));
        }
        let speeds: Vec<f64> = half_lives
            .iter()
            .map(|h| std::f64::consts::LN_2 / h)
            .collect();
        let covariance =
            DMatrix::identity(half_lives.len(), half_lives.len()) * DEFAULT_FACTOR_VARIANCE;
        Self::new(speeds, covariance)
    }

    /// Sets the fixed mean-reversion level.
    #[must_use]
    pub fn with_mean_level(mut self, level: f64) -> Self {
        self.mean_level = level;
        self
    }

    /// Promotes the mean-reversion level to a fitted state component.
    ///
    /// The state vector grows by one; the new component starts at the
    /// current fixed level.
    #[must_use]
    pub fn with_fitted_mean_level(mut self) -> Self {
        if !self.fit_mean_level {
            self.fit_mean_level = true;
            self.state = self.state.push(self.mean_level);
        }
        self
    }

    /// Returns the number of factors.
    #[must_use]
    pub fn factors(&self) -> usize {
        self.speeds.len()
    }

    /// Returns the mean-reversion speeds.
    #[must_use]
    pub fn speeds(&self) -> &[f64] {
        &self.speeds
    }

    fn mean_level_value(&self) -> f64 {
        if self.fit_mean_level {
            self.state[self.speeds.len()]
        } else {
            self.mean_level
        }
    }

    /// `B(k, t)`: the factor loading of a speed-`k` factor at maturity `t`.
    fn loading(k: f64, t: f64) -> f64 {
        if k == 0.0 {
            t
        } else {
            (1.0 - (-k * t).exp()) / k
        }
    }

    /// `A(t)`: the variance adjustment accumulated to maturity `t`.
    fn variance_adjustment(&self, t: f64) -> f64 {
        let mut total = 0.0;
        for (i, &ki) in self.speeds.iter().enumerate() {
            for (j, &kj) in self.speeds.iter().enumerate() {
                let bracket = t - Self::loading(ki, t) - Self::loading(kj, t)
                    + Self::loading(ki + kj, t);
                total += self.covariance[(i, j)] / (ki * kj) * bracket;
            }
        }
        total
    }

    fn log_discount_at(&self, t: f64) -> f64 {
        let drift = self.mean_level_value() * t - 0.5 * self.variance_adjustment(t);
        let factor_sum: f64 = self
            .speeds
            .iter()
            .zip(self.state.iter())
            .map(|(&k, &x)| Self::loading(k, t) * x)
            .sum();
        drift + factor_sum
    }

    fn check_tenor(t: f64) -> CurveResult<()> {
        if !t.is_finite() || t < 0.0 {
            return Err(CurveError::tenor_out_of_range(t, 0.0, f64::INFINITY));
        }
        Ok(())
    }
}

impl DiscountFunction for MeanReversionModel {
    fn discount(&self, t: f64) -> CurveResult<f64> {
        Self::check_tenor(t)?;
        Ok((-self.log_discount_at(t)).exp())
    }

    fn discount_with_gradient(&self, t: f64) -> CurveResult<(f64, DVector<f64>)> {
        Self::check_tenor(t)?;
        let df = (-self.log_discount_at(t)).exp();

        let mut gradient = DVector::zeros(self.state.len());
        for (i, &k) in self.speeds.iter().enumerate() {
            gradient[i] = -Self::loading(k, t) * df;
        }
        if self.fit_mean_level {
            gradient[self.speeds.len()] = -t * df;
        }

        Ok((df, gradient))
    }
}

impl CurveModel for MeanReversionModel {
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

    fn covariance(&self) -> Option<&DMatrix<f64>> {
        Some(&self.covariance)
    }

    fn set_covariance(&mut self, covariance: DMatrix<f64>) -> CurveResult<()> {
        let factors = self.speeds.len();
        if covariance.nrows() != factors || covariance.ncols() != factors {
            return Err(CurveError::invalid_argument(format!(
                "covariance is {}x{}, expected {factors}x{factors}",
                covariance.nrows(),
                covariance.ncols()
            )));
        }
        self.covariance = covariance;
        Ok(())
    }

    fn info(&self) -> String {
        format!(
            "mean-reversion model, {} factor(s){}",
            self.speeds.len(),
            if self.fit_mean_level {
                ", fitted mean level"
            } else {
                ""
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_construction_validations() {
        assert!(MeanReversionModel::new(vec![], DMatrix::zeros(0, 0)).is_err());
        assert!(MeanReversionModel::new(vec![0.0], DMatrix::identity(1, 1)).is_err());
        assert!(MeanReversionModel::new(vec![-0.1], DMatrix::identity(1, 1)).is_err());
        assert!(MeanReversionModel::new(vec![0.1], DMatrix::identity(2, 2)).is_err());
        assert!(MeanReversionModel::new(vec![0.1], DMatrix::identity(1, 1)).is_ok());
    }

    #[test]
    fn test_half_life_speeds() {
        let model = MeanReversionModel::from_half_lives(&[10.0, 2.0]).unwrap();
        assert_relative_eq!(model.speeds()[0], std::f64::consts::LN_2 / 10.0);
        assert_relative_eq!(model.speeds()[1], std::f64::consts::LN_2 / 2.0);
        assert_eq!(model.factors(), 2);
        assert_eq!(model.state_len(), 2);
    }

    #[test]
    fn test_loading_limits() {
        assert_relative_eq!(MeanReversionModel::loading(0.0, 7.0), 7.0);
        // Small k approaches t (cancellation limits the precision here).
        assert_relative_eq!(
            MeanReversionModel::loading(1e-12, 7.0),
            7.0,
            epsilon = 1e-3
        );
        // Half-life of 10 years halves the exponential at t = 10.
        let k = std::f64::consts::LN_2 / 10.0;
        assert_relative_eq!(
            MeanReversionModel::loading(k, 10.0),
            0.5 / k,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_zero_state_discount_is_variance_adjustment() {
        // With x = 0 and w = 0, F(t) = -A(t)/2, computed here from the
        // closed form directly.
        let k = std::f64::consts::LN_2 / 10.0;
        let variance = 1e-4;
        let model =
            MeanReversionModel::new(vec![k], DMatrix::from_element(1, 1, variance)).unwrap();

        let t = 10.0;
        let b = |speed: f64| (1.0 - (-speed * t).exp()) / speed;
        let a = variance / (k * k) * (t - 2.0 * b(k) + b(2.0 * k));

        assert_relative_eq!(
            model.discount(t).unwrap(),
            (0.5 * a).exp(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_discount_with_mean_level() {
        let model = MeanReversionModel::new(
            vec![0.1],
            DMatrix::zeros(1, 1),
        )
        .unwrap()
        .with_mean_level(0.03);

        // Zero covariance: F(t) = w t exactly at zero state.
        assert_relative_eq!(
            model.discount(5.0).unwrap(),
            (-0.15f64).exp(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_gradient_is_loading_times_discount() {
        let k = 0.2;
        let mut model =
            MeanReversionModel::new(vec![k], DMatrix::from_element(1, 1, 1e-4)).unwrap();
        model.set_state(DVector::from_vec(vec![0.02])).unwrap();

        let t = 4.0;
        let (df, gradient) = model.discount_with_gradient(t).unwrap();
        let b = (1.0 - (-k * t).exp()) / k;
        assert_relative_eq!(gradient[0], -b * df, epsilon = 1e-14);
    }

    #[test]
    fn test_fitted_mean_level_extends_state() {
        let model = MeanReversionModel::from_half_lives(&[5.0])
            .unwrap()
            .with_mean_level(0.02)
            .with_fitted_mean_level();

        assert_eq!(model.state_len(), 2);
        assert_relative_eq!(model.state()[1], 0.02);

        let (df, gradient) = model.discount_with_gradient(3.0).unwrap();
        assert_relative_eq!(gradient[1], -3.0 * df, epsilon = 1e-14);
    }

    #[test]
    fn test_negative_tenor_fails() {
        let model = MeanReversionModel::from_half_lives(&[5.0]).unwrap();
        assert!(model.discount(-0.01).is_err());
    }

    #[test]
    fn test_covariance_capability() {
        let mut model = MeanReversionModel::from_half_lives(&[5.0, 10.0]).unwrap();
        assert!(model.covariance().is_some());
        assert!(model.set_covariance(DMatrix::identity(2, 2) * 2e-4).is_ok());
        assert_relative_eq!(model.covariance().unwrap()[(0, 0)], 2e-4);
        assert!(model.set_covariance(DMatrix::identity(3, 3)).is_err());
    }
}
