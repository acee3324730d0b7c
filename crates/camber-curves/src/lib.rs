//! # Camber Curves
//!
//! Parametric discount curve fitting and calibration.
//!
//! This crate turns a small set of market instrument quotes into a
//! continuous discount-factor function and keeps the fitted model's
//! structural covariance in line with historical data:
//!
//! - **Discount contract**: the [`DiscountFunction`] trait with analytic
//!   state gradients
//! - **Instruments**: a sealed set of quote kinds (zero rate, FRA,
//!   instantaneous forward, vanilla swap)
//! - **Models**: log-discount spline, multi-factor mean-reversion, and
//!   discretized forward grid, behind the [`CurveModel`] capability trait
//! - **Fitting**: a constrained Newton solver with exact Lagrange
//!   handling of linear constraints and quadratic regularizers
//! - **Calibration**: an outer loop matching structural covariance to the
//!   realized covariance of fitted state time series
//!
//! ## Quick Start
//!
//! ```rust
//! use camber_curves::prelude::*;
//!
//! // Three zero-coupon quotes.
//! let maturities = [1.0, 2.0, 3.0];
//! let instruments: Vec<Instrument> = maturities
//!     .iter()
//!     .map(|&m| Instrument::from(ZeroRate::new(m).unwrap()))
//!     .collect();
//!
//! // Fit a quadratic log-discount spline to them.
//! let mut model = SplineModel::new(&maturities, 2).unwrap();
//! let report = fit_yield_curve(
//!     &mut model,
//!     &instruments,
//!     &[0.030, 0.064, 0.105],
//!     &FitConfig::default(),
//! )
//! .unwrap();
//! assert!(report.converged);
//!
//! // The fitted model is the discount function.
//! let df = model.discount(1.5).unwrap();
//! assert!(df > 0.0 && df < 1.0);
//! ```
//!
//! The engine is deterministic and single-threaded: fits and calibrations
//! run to completion synchronously, and callers must serialize access to
//! a model instance.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]
#![allow(clippy::unreadable_literal)]

pub mod calibration;
pub mod discount;
pub mod error;
pub mod fitting;
pub mod instruments;
pub mod models;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::calibration::{
        calibrate, CalibrationConfig, CalibrationReport, DiscretizedForwardTemplate,
        MeanReversionTemplate, ModelTemplate, RatePanel,
    };
    pub use crate::discount::DiscountFunction;
    pub use crate::error::{CurveError, CurveResult};
    pub use crate::fitting::{fit_yield_curve, FitConfig, FitReport};
    pub use crate::instruments::{
        CurveInstrument, ForwardRateAgreement, InstantaneousForward, Instrument, Swap, ZeroRate,
    };
    pub use crate::models::{
        BoundaryCondition, CurveModel, DiscretizedForwardModel, MeanReversionModel, SplineModel,
    };
    pub use camber_math::spline::BSplineBasis;
}

pub use calibration::{calibrate, CalibrationConfig, CalibrationReport, ModelTemplate, RatePanel};
pub use discount::DiscountFunction;
pub use error::{CurveError, CurveResult};
pub use fitting::{fit_yield_curve, FitConfig, FitReport};
pub use instruments::Instrument;
pub use models::CurveModel;
