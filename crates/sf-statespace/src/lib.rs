//! State-space control for linear plants sampled at a variable period.
//!
//! A [`PeriodVariantLoop`] combines a steady-state observer with state
//! feedback. Coefficients are supplied as validated bundles
//! ([`PlantCoeffs`], [`ControllerCoeffs`], [`ObserverCoeffs`]); the loop
//! re-discretizes the continuous plant for whatever period actually elapsed
//! between ticks, so jitter in the scheduler does not bias the estimate.

pub mod coeffs;
pub mod discretize;
pub mod error;
pub mod estimator;
pub mod period_variant;
pub mod simulator;

pub use coeffs::{ControllerCoeffs, Dims, ObserverCoeffs, PlantCoeffs};
pub use discretize::{discretize_ab, discretize_q, discretize_r};
pub use error::{StateSpaceError, StateSpaceResult};
pub use estimator::Estimator;
pub use period_variant::{DEFAULT_NOMINAL_PERIOD_S, PeriodVariantLoop};
pub use simulator::PlantSimulator;
