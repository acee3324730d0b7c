//! Error types for curve operations.
//!
//! Errors fall into three families that mirror how callers must react:
//! invalid-argument errors raised before any iteration starts (fix the
//! setup), domain errors raised at evaluation time (fix the inputs), and
//! convergence errors raised when an iteration cap is exhausted (retry with
//! different settings). None are recovered internally; all propagate
//! synchronously to the caller.

use camber_math::MathError;
use thiserror::Error;

/// A specialized Result type for curve operations.
pub type CurveResult<T> = Result<T, CurveError>;

/// Error types for curve operations.
#[derive(Error, Debug, Clone)]
pub enum CurveError {
    /// Construction-time argument validation failed.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the invalid argument.
        reason: String,
    },

    /// Instrument count and market quote count differ.
    #[error("Quote count mismatch: {instruments} instruments, {quotes} quotes")]
    QuoteCountMismatch {
        /// Number of instruments supplied.
        instruments: usize,
        /// Number of market quotes supplied.
        quotes: usize,
    },

    /// More equations than state components.
    #[error("Over-determined system: {equations} equations for {states} state components")]
    OverDetermined {
        /// Instrument plus constraint rows.
        equations: usize,
        /// State vector length.
        states: usize,
    },

    /// Under-determined system without a quadratic regularizer.
    #[error(
        "Missing regularizer: {equations} equations under-determine {states} state components"
    )]
    MissingRegularizer {
        /// Instrument plus constraint rows.
        equations: usize,
        /// State vector length.
        states: usize,
    },

    /// Quadratic regularizer has the wrong shape.
    #[error("Regularizer is {rows}x{cols}, expected {states}x{states}")]
    RegularizerShape {
        /// Supplied row count.
        rows: usize,
        /// Supplied column count.
        cols: usize,
        /// State vector length.
        states: usize,
    },

    /// Instrument maturity is not strictly positive.
    #[error("Maturity must be positive, got {maturity}")]
    NonPositiveMaturity {
        /// The offending maturity in years.
        maturity: f64,
    },

    /// Requested tenor is outside the curve's valid range.
    #[error("Tenor {requested:.4} out of range [{min:.4}, {max:.4}]")]
    TenorOutOfRange {
        /// The requested tenor in years.
        requested: f64,
        /// Minimum valid tenor.
        min: f64,
        /// Maximum valid tenor.
        max: f64,
    },

    /// Evaluation produced a degenerate value.
    #[error("Invalid value: {reason}")]
    InvalidValue {
        /// Description of why the value is invalid.
        reason: String,
    },

    /// A model capability was requested that the variant does not provide.
    #[error("Model '{model}' does not support {capability}")]
    UnsupportedCapability {
        /// The missing capability.
        capability: String,
        /// Description of the model.
        model: String,
    },

    /// Newton iteration exhausted its cap without reaching tolerance.
    #[error("Failed to converge after {iterations} iterations (max residual: {residual:.2e})")]
    ConvergenceFailure {
        /// Number of iterations attempted.
        iterations: usize,
        /// Final maximum absolute rate residual.
        residual: f64,
    },

    /// Covariance calibration exhausted its cap without reaching tolerance.
    #[error(
        "Calibration failed to converge after {iterations} iterations (max covariance gap: {delta:.2e})"
    )]
    CalibrationFailure {
        /// Number of outer iterations attempted.
        iterations: usize,
        /// Final maximum absolute entrywise covariance gap.
        delta: f64,
    },

    /// Error lifted from the numerical kernel.
    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

impl CurveError {
    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates a non-positive maturity error.
    #[must_use]
    pub fn non_positive_maturity(maturity: f64) -> Self {
        Self::NonPositiveMaturity { maturity }
    }

    /// Creates a tenor out of range error.
    #[must_use]
    pub fn tenor_out_of_range(requested: f64, min: f64, max: f64) -> Self {
        Self::TenorOutOfRange {
            requested,
            min,
            max,
        }
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }

    /// Creates an unsupported capability error.
    #[must_use]
    pub fn unsupported_capability(
        capability: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::UnsupportedCapability {
            capability: capability.into(),
            model: model.into(),
        }
    }

    /// Creates a convergence failure error.
    #[must_use]
    pub fn convergence_failure(iterations: usize, residual: f64) -> Self {
        Self::ConvergenceFailure {
            iterations,
            residual,
        }
    }

    /// Creates a calibration failure error.
    #[must_use]
    pub fn calibration_failure(iterations: usize, delta: f64) -> Self {
        Self::CalibrationFailure { iterations, delta }
    }
}
