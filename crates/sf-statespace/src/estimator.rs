//! State estimator capability.

use nalgebra::DVector;

use crate::error::StateSpaceResult;

/// Predict/correct state estimator.
pub trait Estimator {
    /// Propagate the estimate over `dt` seconds.
    fn predict(&mut self, dt: f64) -> StateSpaceResult<()>;

    /// Fold in a measurement vector.
    fn correct(&mut self, y: &DVector<f64>) -> StateSpaceResult<()>;

    /// Current state estimate.
    fn x_hat(&self) -> &DVector<f64>;
}
