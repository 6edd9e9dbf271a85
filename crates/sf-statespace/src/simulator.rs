//! True-plant propagation, for closing a loop without hardware.

use nalgebra::DVector;

use crate::coeffs::{Dims, PlantCoeffs, check_len};
use crate::discretize::discretize_ab;
use crate::error::StateSpaceResult;

/// Propagates a plant's true state with the same zero-order-hold
/// discretization the loop uses.
#[derive(Debug, Clone)]
pub struct PlantSimulator {
    plant: PlantCoeffs,
    x: DVector<f64>,
}

impl PlantSimulator {
    /// Simulator starting from the zero state.
    pub fn new(plant: PlantCoeffs) -> Self {
        let x = DVector::zeros(plant.dims().states);
        Self { plant, x }
    }

    pub fn with_state(mut self, x: DVector<f64>) -> StateSpaceResult<Self> {
        self.set_state(x)?;
        Ok(self)
    }

    pub fn dims(&self) -> Dims {
        self.plant.dims()
    }

    pub fn state(&self) -> &DVector<f64> {
        &self.x
    }

    pub fn set_state(&mut self, x: DVector<f64>) -> StateSpaceResult<()> {
        check_len("state", &x, self.plant.dims().states)?;
        self.x = x;
        Ok(())
    }

    /// Measurement for the current state under input `u`.
    pub fn output(&self, u: &DVector<f64>) -> StateSpaceResult<DVector<f64>> {
        check_len("input", u, self.plant.dims().inputs)?;
        Ok(self.plant.output(&self.x, u))
    }

    /// Hold `u` for `dt` seconds and return the new measurement.
    pub fn step(&mut self, u: &DVector<f64>, dt: f64) -> StateSpaceResult<DVector<f64>> {
        check_len("input", u, self.plant.dims().inputs)?;
        let (a_d, b_d) = discretize_ab(self.plant.a(), self.plant.b(), dt)?;
        self.x = &a_d * &self.x + &b_d * u;
        Ok(self.plant.output(&self.x, u))
    }
}
