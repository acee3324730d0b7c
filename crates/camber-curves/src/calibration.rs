//! Covariance calibration against historical rate panels.
//!
//! Fitting matches a model's state vector to one date's quotes;
//! calibration matches the model's *structural* covariance to the
//! statistics of many dates. Each outer iteration fits every date in a
//! historical panel, first-differences the resulting state-vector time
//! series, estimates its annualized sample covariance, and overwrites the
//! template's structural covariance with the realized one until the two
//! agree entrywise. The structural covariance is the only state that
//! persists across fitting sessions, and this loop is its only writer;
//! it writes between, never during, individual curve fits.

use camber_math::statistics::{first_differences, sample_covariance};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult};
use crate::fitting::{fit_yield_curve, FitConfig};
use crate::instruments::{CurveInstrument, Instrument};
use crate::models::{CurveModel, DiscretizedForwardModel, MeanReversionModel};

/// Default maximum number of outer calibration iterations.
pub const DEFAULT_MAX_OUTER_ITERATIONS: usize = 50;

/// Default entrywise tolerance on the covariance gap.
pub const DEFAULT_COVARIANCE_TOLERANCE: f64 = 1e-6;

/// Default annualization factor (trading days per year).
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 250.0;

/// A historical panel of market quotes.
///
/// One row per date (ascending), one column per instrument. Missing
/// quotes are represented as NaN and tolerated: the covariance estimator
/// works pairwise, and dates that cannot be fitted contribute nothing.
#[derive(Debug, Clone)]
pub struct RatePanel {
    rows: Vec<Vec<f64>>,
    width: usize,
    periods_per_year: f64,
}

impl RatePanel {
    /// Creates a panel from row-per-date quotes, assuming daily sampling.
    ///
    /// # Errors
    ///
    /// Returns an error if the panel is empty or the rows have
    /// inconsistent widths.
    pub fn new(rows: Vec<Vec<f64>>) -> CurveResult<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 {
            return Err(CurveError::invalid_argument(
                "rate panel must have at least one column and one row",
            ));
        }
        if rows.iter().any(|row| row.len() != width) {
            return Err(CurveError::invalid_argument(
                "rate panel rows have inconsistent widths",
            ));
        }
        Ok(Self {
            rows,
            width,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        })
    }

    /// Sets the sampling frequency used for annualization.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not strictly positive.
    pub fn with_periods_per_year(mut self, periods_per_year: f64) -> CurveResult<Self> {
        if !periods_per_year.is_finite() || periods_per_year <= 0.0 {
            return Err(CurveError::invalid_argument(
                "periods per year must be positive",
            ));
        }
        self.periods_per_year = periods_per_year;
        Ok(self)
    }

    /// Returns the number of dates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the panel has no dates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of instrument columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the annualization factor.
    #[must_use]
    pub fn periods_per_year(&self) -> f64 {
        self.periods_per_year
    }

    /// Returns the quote rows, oldest first.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }
}

/// Produces fresh models for the calibration loop and owns the structural
/// covariance being calibrated.
pub trait ModelTemplate {
    /// Builds a fresh model for the given instrument set, carrying the
    /// template's current covariance.
    ///
    /// # Errors
    ///
    /// Returns an error when the instrument set is incompatible with the
    /// template.
    fn build(&self, instruments: &[Instrument]) -> CurveResult<Box<dyn CurveModel>>;

    /// Returns the current structural covariance.
    fn covariance(&self) -> &DMatrix<f64>;

    /// Replaces the structural covariance.
    ///
    /// # Errors
    ///
    /// Returns an error when the matrix has the wrong shape.
    fn set_covariance(&mut self, covariance: DMatrix<f64>) -> CurveResult<()>;

    /// Returns a short human-readable description.
    fn info(&self) -> String;
}

/// Template producing [`MeanReversionModel`]s with one factor per
/// instrument, each factor's half-life equal to its instrument's maturity.
#[derive(Debug, Clone)]
pub struct MeanReversionTemplate {
    covariance: DMatrix<f64>,
}

impl MeanReversionTemplate {
    /// Creates a template for the given factor count with the default
    /// diagonal covariance.
    ///
    /// # Errors
    ///
    /// Returns an error if `factors` is zero.
    pub fn new(factors: usize) -> CurveResult<Self> {
        if factors == 0 {
            return Err(CurveError::invalid_argument(
                "at least one factor is required",
            ));
        }
        Ok(Self {
            covariance: DMatrix::identity(factors, factors) * 1e-4,
        })
    }

    /// Replaces the initial covariance.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix shape does not match the factor
    /// count.
    pub fn with_covariance(mut self, covariance: DMatrix<f64>) -> CurveResult<Self> {
        self.set_covariance(covariance)?;
        Ok(self)
    }

    fn factors(&self) -> usize {
        self.covariance.nrows()
    }
}

impl ModelTemplate for MeanReversionTemplate {
    fn build(&self, instruments: &[Instrument]) -> CurveResult<Box<dyn CurveModel>> {
        if instruments.len() != self.factors() {
            return Err(CurveError::invalid_argument(format!(
                "template has {} factors but {} instruments were supplied",
                self.factors(),
                instruments.len()
            )));
        }
        let half_lives: Vec<f64> = instruments.iter().map(CurveInstrument::maturity).collect();
        let speeds: Vec<f64> = half_lives
            .iter()
            .map(|h| std::f64::consts::LN_2 / h)
            .collect();
        let model = MeanReversionModel::new(speeds, self.covariance.clone())?;
        Ok(Box::new(model))
    }

    fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    fn set_covariance(&mut self, covariance: DMatrix<f64>) -> CurveResult<()> {
        let factors = self.factors();
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
        format!("mean-reversion template, {} factor(s)", self.factors())
    }
}

/// Template producing [`DiscretizedForwardModel`]s on a fixed grid.
#[derive(Debug, Clone)]
pub struct DiscretizedForwardTemplate {
    intervals: usize,
    horizon: Option<f64>,
    covariance: DMatrix<f64>,
}

impl DiscretizedForwardTemplate {
    /// Creates a template with the given interval count and the default
    /// diagonal covariance. The horizon defaults to the longest
    /// instrument maturity at build time.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 2 intervals are requested.
    pub fn new(intervals: usize) -> CurveResult<Self> {
        if intervals < 2 {
            return Err(CurveError::invalid_argument(format!(
                "at least 2 intervals are required, got {intervals}"
            )));
        }
        Ok(Self {
            intervals,
            horizon: None,
            covariance: DMatrix::identity(intervals + 1, intervals + 1) * 1e-4,
        })
    }

    /// Fixes the grid horizon instead of deriving it from instruments.
    ///
    /// # Errors
    ///
    /// Returns an error if the horizon is not strictly positive.
    pub fn with_horizon(mut self, horizon: f64) -> CurveResult<Self> {
        if !horizon.is_finite() || horizon <= 0.0 {
            return Err(CurveError::invalid_argument(format!(
                "horizon must be positive, got {horizon}"
            )));
        }
        self.horizon = Some(horizon);
        Ok(self)
    }

    /// Replaces the initial covariance.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix shape does not match the grid.
    pub fn with_covariance(mut self, covariance: DMatrix<f64>) -> CurveResult<Self> {
        self.set_covariance(covariance)?;
        Ok(self)
    }
}

impl ModelTemplate for DiscretizedForwardTemplate {
    fn build(&self, instruments: &[Instrument]) -> CurveResult<Box<dyn CurveModel>> {
        let horizon = match self.horizon {
            Some(horizon) => horizon,
            None => instruments
                .iter()
                .map(CurveInstrument::maturity)
                .fold(f64::NEG_INFINITY, f64::max),
        };
        if !horizon.is_finite() || horizon <= 0.0 {
            return Err(CurveError::invalid_argument(
                "cannot derive a horizon from an empty instrument set",
            ));
        }
        let model = DiscretizedForwardModel::new(horizon, self.intervals)?
            .with_covariance(self.covariance.clone())?;
        Ok(Box::new(model))
    }

    fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    fn set_covariance(&mut self, covariance: DMatrix<f64>) -> CurveResult<()> {
        let states = self.intervals + 1;
        if covariance.nrows() != states || covariance.ncols() != states {
            return Err(CurveError::invalid_argument(format!(
                "covariance is {}x{}, expected {states}x{states}",
                covariance.nrows(),
                covariance.ncols()
            )));
        }
        self.covariance = covariance;
        Ok(())
    }

    fn info(&self) -> String {
        format!(
            "discretized forward template, {} intervals",
            self.intervals
        )
    }
}

/// Configuration for the calibration loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Maximum number of outer iterations.
    pub max_outer_iterations: usize,
    /// Entrywise tolerance on the covariance gap.
    pub covariance_tolerance: f64,
    /// Configuration of the per-date curve fits.
    pub fit: FitConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_outer_iterations: DEFAULT_MAX_OUTER_ITERATIONS,
            covariance_tolerance: DEFAULT_COVARIANCE_TOLERANCE,
            fit: FitConfig::default(),
        }
    }
}

impl CalibrationConfig {
    /// Creates a configuration with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum outer iterations.
    #[must_use]
    pub fn with_max_outer_iterations(mut self, max_outer_iterations: usize) -> Self {
        self.max_outer_iterations = max_outer_iterations;
        self
    }

    /// Sets the covariance tolerance.
    #[must_use]
    pub fn with_covariance_tolerance(mut self, covariance_tolerance: f64) -> Self {
        self.covariance_tolerance = covariance_tolerance;
        self
    }

    /// Sets the per-date fit configuration.
    #[must_use]
    pub fn with_fit(mut self, fit: FitConfig) -> Self {
        self.fit = fit;
        self
    }
}

/// Result of a calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Number of outer iterations used.
    pub outer_iterations: usize,
    /// Final maximum absolute entrywise covariance gap.
    pub max_delta: f64,
    /// Number of panel dates that could not be fitted (per final
    /// iteration).
    pub skipped_dates: usize,
    /// Whether the loop converged within tolerance.
    pub converged: bool,
}

impl CalibrationReport {
    /// Returns a one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Calibration {}: {} outer iterations, max gap {:.3e}, {} dates skipped",
            if self.converged { "converged" } else { "FAILED" },
            self.outer_iterations,
            self.max_delta,
            self.skipped_dates
        )
    }
}

/// Calibrates a template's structural covariance to a historical panel.
///
/// Per outer iteration: build a fresh model, fit it to every panel date
/// (rebuilding whenever the finite-quote subset changes, warm-starting
/// otherwise), first-difference the state series, and compare its
/// annualized sample covariance to the template's covariance. Below the
/// tolerance the loop stops; otherwise the realized covariance overwrites
/// the structural one and the loop repeats.
///
/// Dates with an empty quote row, or whose reduced quote set
/// under-determines the model, contribute a NaN state row that the
/// pairwise covariance estimator skips.
///
/// # Errors
///
/// Returns a precondition error for an empty instrument list or a panel
/// whose width or length cannot support the estimate, any propagated fit
/// or estimation error, and [`CurveError::CalibrationFailure`] when the
/// outer iteration cap is exhausted.
pub fn calibrate(
    template: &mut dyn ModelTemplate,
    instruments: &[Instrument],
    panel: &RatePanel,
    config: &CalibrationConfig,
) -> CurveResult<CalibrationReport> {
    if instruments.is_empty() {
        return Err(CurveError::invalid_argument("no instruments provided"));
    }
    if panel.width() != instruments.len() {
        return Err(CurveError::invalid_argument(format!(
            "panel has {} columns but {} instruments were supplied",
            panel.width(),
            instruments.len()
        )));
    }
    if panel.len() < 3 {
        return Err(CurveError::invalid_argument(
            "at least 3 panel dates are required to estimate a covariance",
        ));
    }

    let mut last_delta = f64::NAN;
    for outer in 0..config.max_outer_iterations {
        let mut model = template.build(instruments)?;
        let states = model.state_len();

        let mut history: Vec<DVector<f64>> = Vec::with_capacity(panel.len());
        let mut active: Vec<usize> = (0..instruments.len()).collect();
        let mut skipped = 0usize;

        for row in panel.rows() {
            let subset: Vec<usize> = row
                .iter()
                .enumerate()
                .filter(|(_, quote)| quote.is_finite())
                .map(|(column, _)| column)
                .collect();

            if subset.is_empty() {
                history.push(DVector::from_element(states, f64::NAN));
                skipped += 1;
                continue;
            }
            if subset != active {
                // The fittable instrument set changed; restart from a
                // fresh model rather than warm-starting across it.
                model = template.build(instruments)?;
                active = subset.clone();
            }

            let chosen: Vec<Instrument> =
                subset.iter().map(|&column| instruments[column].clone()).collect();
            let quotes: Vec<f64> = subset.iter().map(|&column| row[column]).collect();

            match fit_yield_curve(model.as_mut(), &chosen, &quotes, &config.fit) {
                Ok(_) => history.push(model.state().clone()),
                Err(CurveError::MissingRegularizer { .. }) => {
                    // The surviving quotes under-determine this model;
                    // treat the date as missing.
                    history.push(DVector::from_element(states, f64::NAN));
                    skipped += 1;
                }
                Err(error) => return Err(error),
            }
        }

        let diffs = first_differences(&history).map_err(CurveError::from)?;
        let realized = sample_covariance(&diffs, panel.periods_per_year())?;

        let current = template.covariance();
        if realized.shape() != current.shape() {
            return Err(CurveError::invalid_argument(format!(
                "realized covariance is {}x{} but template covariance is {}x{}",
                realized.nrows(),
                realized.ncols(),
                current.nrows(),
                current.ncols()
            )));
        }

        let delta = (&realized - current).abs().max();
        log::debug!(
            "calibration iteration {}: max covariance gap {delta:.3e}, {skipped} dates skipped",
            outer + 1
        );

        if delta < config.covariance_tolerance {
            return Ok(CalibrationReport {
                outer_iterations: outer + 1,
                max_delta: delta,
                skipped_dates: skipped,
                converged: true,
            });
        }

        template.set_covariance(realized)?;
        last_delta = delta;
    }

    Err(CurveError::calibration_failure(
        config.max_outer_iterations,
        last_delta,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::ZeroRate;
    use approx::assert_relative_eq;

    fn zero_instruments(maturities: &[f64]) -> Vec<Instrument> {
        maturities
            .iter()
            .map(|&m| ZeroRate::new(m).unwrap().into())
            .collect()
    }

    #[test]
    fn test_panel_validations() {
        assert!(RatePanel::new(vec![]).is_err());
        assert!(RatePanel::new(vec![vec![]]).is_err());
        assert!(RatePanel::new(vec![vec![0.03], vec![0.03, 0.04]]).is_err());

        let panel = RatePanel::new(vec![vec![0.03, 0.04], vec![0.031, 0.041]]).unwrap();
        assert_eq!(panel.len(), 2);
        assert_eq!(panel.width(), 2);
        assert_relative_eq!(panel.periods_per_year(), 250.0);

        let weekly = panel.with_periods_per_year(52.0).unwrap();
        assert_relative_eq!(weekly.periods_per_year(), 52.0);
    }

    #[test]
    fn test_template_validations() {
        assert!(MeanReversionTemplate::new(0).is_err());
        assert!(DiscretizedForwardTemplate::new(1).is_err());

        let template = MeanReversionTemplate::new(2).unwrap();
        assert!(template
            .clone()
            .with_covariance(DMatrix::identity(3, 3))
            .is_err());
        assert!(template.with_covariance(DMatrix::identity(2, 2) * 1e-5).is_ok());
    }

    #[test]
    fn test_template_build_checks_instrument_count() {
        let template = MeanReversionTemplate::new(2).unwrap();
        let instruments = zero_instruments(&[5.0]);
        assert!(template.build(&instruments).is_err());

        let instruments = zero_instruments(&[2.0, 10.0]);
        let model = template.build(&instruments).unwrap();
        assert_eq!(model.state_len(), 2);
    }

    #[test]
    fn test_calibrate_rejects_mismatched_panel() {
        let mut template = MeanReversionTemplate::new(2).unwrap();
        let instruments = zero_instruments(&[2.0, 10.0]);
        let panel = RatePanel::new(vec![vec![0.05], vec![0.06], vec![0.055]]).unwrap();

        let result = calibrate(
            &mut template,
            &instruments,
            &panel,
            &CalibrationConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_calibrate_requires_enough_dates() {
        let mut template = MeanReversionTemplate::new(1).unwrap();
        let instruments = zero_instruments(&[10.0]);
        let panel = RatePanel::new(vec![vec![0.3], vec![0.31]]).unwrap();

        let result = calibrate(
            &mut template,
            &instruments,
            &panel,
            &CalibrationConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_builders_and_serde() {
        let config = CalibrationConfig::new()
            .with_max_outer_iterations(10)
            .with_covariance_tolerance(1e-8)
            .with_fit(FitConfig::new().with_max_iterations(20));

        assert_eq!(config.max_outer_iterations, 10);
        assert_eq!(config.fit.max_iterations, 20);

        let json = serde_json::to_string(&config).unwrap();
        let parsed: CalibrationConfig = serde_json::from_str(&json).unwrap();
        assert_relative_eq!(parsed.covariance_tolerance, 1e-8);
    }
}
