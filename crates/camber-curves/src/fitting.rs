//! Constrained Newton fitting of curve models to market quotes.
//!
//! [`fit_yield_curve`] adjusts a model's state vector until the rates
//! implied by a set of instruments match the quoted market rates, subject
//! to the model's linear equality constraints. Instruments are nonlinear
//! in the state (through the exponential discount map), so each iteration
//! linearizes: the Jacobian is assembled from the instruments' analytic
//! gradients and a single linear solve produces the Newton step.
//!
//! When the model supplies a quadratic regularizer the step instead solves
//! the augmented KKT system: the regularizer acts as an exact smoothness
//! prior through Lagrange multipliers, which is what makes
//! under-determined spline and grid models fittable at all. Near-linear
//! models typically converge in 3-5 iterations.

use camber_math::linear_algebra::solve_linear_system;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult};
use crate::instruments::{CurveInstrument, Instrument};
use crate::models::CurveModel;

/// Default maximum number of Newton iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Default convergence tolerance on rate residuals (absolute, in rate
/// units: a ten-thousandth of a basis point).
pub const DEFAULT_RATE_TOLERANCE: f64 = 1e-8;

/// Configuration for the curve fitter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitConfig {
    /// Maximum number of Newton iterations.
    pub max_iterations: usize,
    /// Convergence tolerance on the maximum absolute rate residual.
    pub rate_tolerance: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            rate_tolerance: DEFAULT_RATE_TOLERANCE,
        }
    }
}

impl FitConfig {
    /// Creates a new configuration with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the rate tolerance.
    #[must_use]
    pub fn with_rate_tolerance(mut self, rate_tolerance: f64) -> Self {
        self.rate_tolerance = rate_tolerance;
        self
    }
}

/// Result of a curve fit.
///
/// The fitted discount function is the model itself, whose state was
/// advanced in place; this report carries the diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    /// Number of Newton steps applied.
    pub iterations: usize,
    /// Final maximum absolute rate residual.
    pub max_residual: f64,
    /// Rate residuals per instrument at convergence.
    pub residuals: Vec<f64>,
    /// Whether the fit converged within tolerance.
    pub converged: bool,
}

impl FitReport {
    /// Returns the residuals in basis points.
    #[must_use]
    pub fn residuals_bps(&self) -> Vec<f64> {
        self.residuals.iter().map(|r| r * 10_000.0).collect()
    }

    /// Returns a one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Fit {}: {} iterations, max residual {:.4}bp",
            if self.converged { "converged" } else { "FAILED" },
            self.iterations,
            self.max_residual * 10_000.0
        )
    }
}

/// Fits a curve model's state vector to market rates.
///
/// # Arguments
///
/// * `model` - The model to fit; its state is advanced in place
/// * `instruments` - Calibration instruments (one implied rate each)
/// * `market_rates` - Quoted rates, one per instrument
/// * `config` - Iteration cap and tolerance
///
/// # Preconditions
///
/// With `n` instruments, `m` constraint rows and `p` state components:
/// the quote count must equal `n`; `n + m` must not exceed `p`; and when
/// `n + m < p` the model must supply a `p x p` quadratic regularizer.
/// All violations are reported before any iteration runs.
///
/// # Errors
///
/// Returns a precondition error as above, a propagated evaluation error
/// from the model or instruments, or [`CurveError::ConvergenceFailure`]
/// when the iteration cap is exhausted.
pub fn fit_yield_curve(
    model: &mut dyn CurveModel,
    instruments: &[Instrument],
    market_rates: &[f64],
    config: &FitConfig,
) -> CurveResult<FitReport> {
    if instruments.is_empty() {
        return Err(CurveError::invalid_argument("no instruments provided"));
    }
    let quote_count = instruments.len();
    if market_rates.len() != quote_count {
        return Err(CurveError::QuoteCountMismatch {
            instruments: quote_count,
            quotes: market_rates.len(),
        });
    }

    let states = model.state_len();
    let constraints = model.constraints();
    let constraint_count = constraints.as_ref().map_or(0, |(matrix, _)| matrix.nrows());

    if let Some((matrix, rhs)) = &constraints {
        if matrix.ncols() != states || rhs.len() != matrix.nrows() {
            return Err(CurveError::invalid_argument(format!(
                "constraints are {}x{} with {} targets, expected {} columns",
                matrix.nrows(),
                matrix.ncols(),
                rhs.len(),
                states
            )));
        }
    }

    let equations = quote_count + constraint_count;
    if equations > states {
        return Err(CurveError::OverDetermined { equations, states });
    }

    let quadratic = model.quadratic();
    if equations < states && quadratic.is_none() {
        return Err(CurveError::MissingRegularizer { equations, states });
    }
    if let Some(h) = &quadratic {
        if h.nrows() != states || h.ncols() != states {
            return Err(CurveError::RegularizerShape {
                rows: h.nrows(),
                cols: h.ncols(),
                states,
            });
        }
    }

    let mut last_residual = f64::NAN;
    for iteration in 0..config.max_iterations {
        // Jacobian rows and rate residuals at the current state.
        let mut system = DMatrix::zeros(equations, states);
        let mut rhs = DVector::zeros(equations);
        let mut residuals = Vec::with_capacity(quote_count);
        let mut max_residual = 0.0f64;

        for (row, instrument) in instruments.iter().enumerate() {
            let (implied, gradient) = instrument.implied_rate_with_gradient(&*model)?;
            if gradient.len() != states {
                return Err(CurveError::invalid_argument(format!(
                    "instrument gradient has length {}, expected {states}",
                    gradient.len()
                )));
            }
            let diff = market_rates[row] - implied;
            system.row_mut(row).copy_from(&gradient.transpose());
            rhs[row] = diff;
            residuals.push(diff);
            max_residual = max_residual.max(diff.abs());
        }

        // The constraints are only guaranteed to hold after a step has
        // been taken, so convergence is never declared on iteration 0.
        if iteration > 0 && max_residual < config.rate_tolerance {
            log::debug!(
                "fit converged after {iteration} steps (max residual {max_residual:.3e})"
            );
            return Ok(FitReport {
                iterations: iteration,
                max_residual,
                residuals,
                converged: true,
            });
        }

        if let Some((matrix, targets)) = &constraints {
            let residual = targets - matrix * model.state();
            for row in 0..constraint_count {
                system
                    .row_mut(quote_count + row)
                    .copy_from(&matrix.row(row));
                rhs[quote_count + row] = residual[row];
            }
        }

        let step = if let Some(h) = &quadratic {
            solve_kkt(h, &system, &rhs, model.state())?
        } else {
            // Square system: equations == states.
            solve_linear_system(&system, &rhs).map_err(CurveError::from)?
        };

        model.apply_step(&step)?;
        last_residual = max_residual;
        log::debug!("fit iteration {iteration}: max residual {max_residual:.3e}");
    }

    Err(CurveError::convergence_failure(
        config.max_iterations,
        last_residual,
    ))
}

/// Solves the augmented KKT system
///
/// ```text
/// [ H  Aᵀ ] [ Δx ]   [ -H·x ]
/// [ A  0  ] [ λ  ] = [  b   ]
/// ```
///
/// and returns the state step `Δx`. Minimizing the regularizer at the
/// stepped state subject to the linearized equations, solved exactly via
/// Lagrange multipliers.
fn solve_kkt(
    quadratic: &DMatrix<f64>,
    system: &DMatrix<f64>,
    rhs: &DVector<f64>,
    state: &DVector<f64>,
) -> CurveResult<DVector<f64>> {
    let states = quadratic.nrows();
    let equations = system.nrows();
    let dim = states + equations;

    let mut kkt = DMatrix::zeros(dim, dim);
    kkt.view_mut((0, 0), (states, states)).copy_from(quadratic);
    kkt.view_mut((0, states), (states, equations))
        .copy_from(&system.transpose());
    kkt.view_mut((states, 0), (equations, states))
        .copy_from(system);

    let mut full_rhs = DVector::zeros(dim);
    full_rhs
        .rows_mut(0, states)
        .copy_from(&(-(quadratic * state)));
    full_rhs.rows_mut(states, equations).copy_from(rhs);

    let solution = solve_linear_system(&kkt, &full_rhs)?;
    Ok(solution.rows(0, states).into_owned())
}
