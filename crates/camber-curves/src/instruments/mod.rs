//! Market instruments used to fit discount curves.
//!
//! Each instrument converts a [`DiscountFunction`] into an implied market
//! rate, optionally with the rate's gradient with respect to the model's
//! state vector. The fitter assembles its Jacobian from those gradients.
//!
//! The instrument set is sealed: the [`Instrument`] enum enumerates every
//! supported kind, and the per-kind structs live in their own modules:
//!
//! - [`ZeroRate`]: accumulated log-discount `-ln df(T)`
//! - [`ForwardRateAgreement`]: continuously-compounded zero yield
//! - [`InstantaneousForward`]: finite-difference instantaneous forward
//! - [`Swap`]: vanilla fixed-for-floating par swap rate

mod forward;
mod fra;
mod swap;
mod zero;

pub use forward::InstantaneousForward;
pub use fra::ForwardRateAgreement;
pub use swap::Swap;
pub use zero::ZeroRate;

use nalgebra::DVector;

use crate::discount::DiscountFunction;
use crate::error::CurveResult;

/// Common contract for curve instruments.
pub trait CurveInstrument: Send + Sync {
    /// Returns the instrument maturity in years.
    fn maturity(&self) -> f64;

    /// Returns the rate implied by the given discount function.
    fn implied_rate(&self, discount: &dyn DiscountFunction) -> CurveResult<f64>;

    /// Returns the implied rate together with its gradient with respect to
    /// the discount function's state vector.
    fn implied_rate_with_gradient(
        &self,
        discount: &dyn DiscountFunction,
    ) -> CurveResult<(f64, DVector<f64>)>;

    /// Returns a short human-readable description.
    fn description(&self) -> String;
}

/// The sealed set of instrument kinds.
#[derive(Debug, Clone)]
pub enum Instrument {
    /// Accumulated log-discount quote.
    ZeroRate(ZeroRate),
    /// Continuously-compounded zero yield quote.
    ForwardRateAgreement(ForwardRateAgreement),
    /// Instantaneous forward rate quote.
    InstantaneousForward(InstantaneousForward),
    /// Par swap rate quote.
    Swap(Swap),
}

impl Instrument {
    fn inner(&self) -> &dyn CurveInstrument {
        match self {
            Self::ZeroRate(inner) => inner,
            Self::ForwardRateAgreement(inner) => inner,
            Self::InstantaneousForward(inner) => inner,
            Self::Swap(inner) => inner,
        }
    }
}

impl CurveInstrument for Instrument {
    fn maturity(&self) -> f64 {
        self.inner().maturity()
    }

    fn implied_rate(&self, discount: &dyn DiscountFunction) -> CurveResult<f64> {
        self.inner().implied_rate(discount)
    }

    fn implied_rate_with_gradient(
        &self,
        discount: &dyn DiscountFunction,
    ) -> CurveResult<(f64, DVector<f64>)> {
        self.inner().implied_rate_with_gradient(discount)
    }

    fn description(&self) -> String {
        self.inner().description()
    }
}

impl From<ZeroRate> for Instrument {
    fn from(inner: ZeroRate) -> Self {
        Self::ZeroRate(inner)
    }
}

impl From<ForwardRateAgreement> for Instrument {
    fn from(inner: ForwardRateAgreement) -> Self {
        Self::ForwardRateAgreement(inner)
    }
}

impl From<InstantaneousForward> for Instrument {
    fn from(inner: InstantaneousForward) -> Self {
        Self::InstantaneousForward(inner)
    }
}

impl From<Swap> for Instrument {
    fn from(inner: Swap) -> Self {
        Self::Swap(inner)
    }
}
