//! Simulated plants the CLI closes its loops around.
//!
//! A [`SimulatedPlant`] integrates its model up to the clock's current time
//! whenever it is written to or read, holding the last command in between
//! (zero-order hold). It implements the sensor and actuator capabilities, so
//! controllers drive it exactly as they would drive hardware.

use nalgebra::DVector;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sf_core::{Actuator, Clock, Sensor, SharedClock};
use sf_statespace::PlantSimulator;
use tracing::error;

use crate::error::{CliError, CliResult};

/// First-order lag with optional rate limiting.
///
/// Dynamics: `dx/dt = (gain * u - x) / tau`, clamped to `[-rate_limit, rate_limit]`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FirstOrderPlant {
    /// Time constant (seconds), must be positive
    pub tau: f64,
    /// Steady-state gain from command to output
    #[serde(default = "unit_gain")]
    pub gain: f64,
    /// Maximum rate of change (units per second)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<f64>,
}

fn unit_gain() -> f64 {
    1.0
}

impl FirstOrderPlant {
    /// # Errors
    ///
    /// Returns error if `tau` or `rate_limit` are not positive.
    pub fn new(tau: f64, gain: f64, rate_limit: Option<f64>) -> CliResult<Self> {
        let plant = Self {
            tau,
            gain,
            rate_limit,
        };
        plant.validate()?;
        Ok(plant)
    }

    pub fn validate(&self) -> CliResult<()> {
        if !(self.tau > 0.0) {
            return Err(CliError::Config("tau must be positive".into()));
        }
        if self.rate_limit.is_some_and(|r| !(r > 0.0)) {
            return Err(CliError::Config("rate_limit must be positive".into()));
        }
        Ok(())
    }

    /// Rate of change at output `x` under command `u`.
    pub fn dxdt(&self, x: f64, u: f64) -> f64 {
        let raw = (self.gain * u - x) / self.tau;
        match self.rate_limit {
            Some(limit) => raw.clamp(-limit, limit),
            None => raw,
        }
    }

    /// Explicit Euler step.
    pub fn step(&self, x: f64, dt: f64, u: f64) -> f64 {
        x + self.dxdt(x, u) * dt
    }
}

/// Plant dynamics behind a [`SimulatedPlant`].
#[derive(Debug, Clone)]
pub enum PlantModel {
    FirstOrder { plant: FirstOrderPlant, x: f64 },
    StateSpace(PlantSimulator),
}

impl PlantModel {
    fn inputs(&self) -> usize {
        match self {
            PlantModel::FirstOrder { .. } => 1,
            PlantModel::StateSpace(sim) => sim.dims().inputs,
        }
    }

    /// Largest Euler step taken for the first-order model.
    const MAX_EULER_STEP_S: f64 = 1e-3;

    fn advance(&mut self, u: &DVector<f64>, dt: f64) -> CliResult<()> {
        match self {
            PlantModel::FirstOrder { plant, x } => {
                let steps = (dt / Self::MAX_EULER_STEP_S).ceil().max(1.0) as usize;
                let h = dt / steps as f64;
                for _ in 0..steps {
                    *x = plant.step(*x, h, u[0]);
                }
            }
            PlantModel::StateSpace(sim) => {
                sim.step(u, dt)?;
            }
        }
        Ok(())
    }

    fn output(&self, u: &DVector<f64>) -> CliResult<DVector<f64>> {
        match self {
            PlantModel::FirstOrder { x, .. } => Ok(DVector::from_element(1, *x)),
            PlantModel::StateSpace(sim) => Ok(sim.output(u)?),
        }
    }
}

struct PlantState {
    model: PlantModel,
    u: DVector<f64>,
    last_t: f64,
}

/// Clock-driven plant with zero-order-hold inputs.
pub struct SimulatedPlant {
    clock: SharedClock,
    state: Mutex<PlantState>,
}

impl SimulatedPlant {
    pub fn new(model: PlantModel, clock: SharedClock) -> Self {
        let u = DVector::zeros(model.inputs());
        let last_t = clock.now();
        Self {
            clock,
            state: Mutex::new(PlantState { model, u, last_t }),
        }
    }

    fn catch_up(&self, state: &mut PlantState) -> CliResult<()> {
        let now = self.clock.now();
        let dt = now - state.last_t;
        if dt > 0.0 {
            state.model.advance(&state.u, dt)?;
            state.last_t = now;
        }
        Ok(())
    }

    /// Integrate up to now under the held command, then hold `u`.
    pub fn apply(&self, u: &DVector<f64>) -> CliResult<()> {
        let mut state = self.state.lock();
        if u.len() != state.u.len() {
            return Err(CliError::Config(format!(
                "plant takes {} inputs, got {}",
                state.u.len(),
                u.len()
            )));
        }
        self.catch_up(&mut state)?;
        state.u.copy_from(u);
        Ok(())
    }

    /// Output vector at the current time.
    pub fn measure(&self) -> CliResult<DVector<f64>> {
        let mut state = self.state.lock();
        self.catch_up(&mut state)?;
        state.model.output(&state.u)
    }
}

impl Actuator for SimulatedPlant {
    fn write(&self, effort: f64) {
        if let Err(e) = self.apply(&DVector::from_element(1, effort)) {
            error!(error = %e, "plant rejected command");
        }
    }
}

impl Sensor for SimulatedPlant {
    fn read(&self) -> f64 {
        match self.measure() {
            Ok(y) => y[0],
            Err(e) => {
                error!(error = %e, "plant measurement failed");
                f64::NAN
            }
        }
    }
}
