//! # Camber Math
//!
//! Numerical kernel for the Camber curve-fitting library.
//!
//! This crate provides:
//!
//! - **Splines**: B-spline basis families with analytic derivatives
//! - **Linear Algebra**: dense solves and inversion with partial pivoting
//! - **Statistics**: pairwise-complete covariance estimation for
//!   state-vector time series
//!
//! ## Design Philosophy
//!
//! - **Deterministic**: single-threaded, synchronous routines with no
//!   hidden state
//! - **Numerical Stability**: explicit conventions at knot multiplicities
//!   and careful pivoting
//! - **Explicit Errors**: every routine returns [`MathResult`] rather than
//!   panicking on bad input

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::unreadable_literal)]

pub mod error;
pub mod linear_algebra;
pub mod spline;
pub mod statistics;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{MathError, MathResult};
    pub use crate::linear_algebra::{invert_matrix, solve_linear_system};
    pub use crate::spline::BSplineBasis;
    pub use crate::statistics::{first_differences, sample_covariance};
}

pub use error::{MathError, MathResult};
pub use spline::BSplineBasis;
