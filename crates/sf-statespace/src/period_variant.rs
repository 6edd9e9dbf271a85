//! Observer plus state feedback over a variable period.
//!
//! Each tick:
//!
//! 1. **Predict**: discretize `(A, B)` over the elapsed `dt` and propagate
//!    `x̂ = A_d x̂ + B_d u_prev`.
//! 2. **Correct**: `x̂ += L (y - C x̂ - D u_prev)`.
//! 3. **Control**: `u = clamp(K (r - x̂) + Kff r, u_min, u_max)`.
//!
//! The observer gain `L` is not obtained from an online Riccati recursion.
//! It is derived from the supplied steady-state covariance, re-discretized
//! for the period:
//!
//! ```text
//! P⁻ = A_d P_ss A_dᵀ + Q dt
//! L  = P⁻ Cᵀ (C P⁻ Cᵀ + R / dt)⁻¹
//! ```
//!
//! and cached until the period changes.

use nalgebra::{DMatrix, DVector};
use sf_core::ensure_period;
use tracing::{trace, warn};

use crate::coeffs::{ControllerCoeffs, Dims, ObserverCoeffs, PlantCoeffs, check_len};
use crate::discretize::{discretize_ab, discretize_q, discretize_r};
use crate::error::{StateSpaceError, StateSpaceResult};
use crate::estimator::Estimator;

/// Period assumed by `correct` before the first `predict`.
pub const DEFAULT_NOMINAL_PERIOD_S: f64 = 0.005;

#[derive(Debug, Clone)]
pub struct PeriodVariantLoop {
    plant: PlantCoeffs,
    controller: ControllerCoeffs,
    observer: ObserverCoeffs,
    x_hat: DVector<f64>,
    u: DVector<f64>,
    last_dt: f64,
    gain: Option<(f64, DMatrix<f64>)>,
    saturated: bool,
}

impl PeriodVariantLoop {
    /// Validate the bundles against each other and build a loop with a zero
    /// state estimate.
    pub fn new(
        plant: PlantCoeffs,
        controller: ControllerCoeffs,
        observer: ObserverCoeffs,
    ) -> StateSpaceResult<Self> {
        let dims = plant.dims();
        controller.validate(dims)?;
        observer.validate(dims)?;
        Ok(Self {
            plant,
            controller,
            observer,
            x_hat: DVector::zeros(dims.states),
            u: DVector::zeros(dims.inputs),
            last_dt: DEFAULT_NOMINAL_PERIOD_S,
            gain: None,
            saturated: false,
        })
    }

    /// Period used by `correct` until the first `predict`.
    pub fn with_nominal_period(mut self, dt: f64) -> StateSpaceResult<Self> {
        self.last_dt = ensure_period(dt)?;
        Ok(self)
    }

    pub fn dims(&self) -> Dims {
        self.plant.dims()
    }

    pub fn plant(&self) -> &PlantCoeffs {
        &self.plant
    }

    pub fn controller(&self) -> &ControllerCoeffs {
        &self.controller
    }

    pub fn observer(&self) -> &ObserverCoeffs {
        &self.observer
    }

    /// Control vector from the most recent `control`.
    pub fn u(&self) -> &DVector<f64> {
        &self.u
    }

    /// Whether the most recent control vector was clamped.
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn set_x_hat(&mut self, x_hat: DVector<f64>) -> StateSpaceResult<()> {
        check_len("x_hat", &x_hat, self.dims().states)?;
        self.x_hat = x_hat;
        Ok(())
    }

    /// Zero the estimate and the held control vector.
    pub fn reset(&mut self) {
        self.x_hat.fill(0.0);
        self.u.fill(0.0);
        self.saturated = false;
    }

    /// Observer gain for period `dt` (states × outputs).
    ///
    /// # Errors
    ///
    /// Returns [`StateSpaceError::Numeric`] if the innovation covariance is
    /// singular.
    pub fn observer_gain(&self, dt: f64) -> StateSpaceResult<DMatrix<f64>> {
        let (a_d, _) = discretize_ab(self.plant.a(), self.plant.b(), dt)?;
        let q_d = discretize_q(self.observer.q(), dt)?;
        let p_prior = &a_d * self.observer.p_steady() * a_d.transpose() + q_d;
        let c = self.plant.c();
        let pct = &p_prior * c.transpose();
        let s = c * &pct + discretize_r(self.observer.r(), dt)?;
        let s_inv = s.try_inverse().ok_or_else(|| StateSpaceError::Numeric {
            what: "innovation covariance is singular".to_string(),
        })?;
        Ok(pct * s_inv)
    }

    /// Compute, clamp and hold the control vector for reference `r`
    /// (one entry per state).
    pub fn control(&mut self, r: &DVector<f64>) -> StateSpaceResult<DVector<f64>> {
        check_len("reference", r, self.dims().states)?;
        let mut u = self.controller.k() * (r - &self.x_hat) + self.controller.kff() * r;
        let saturated = self.controller.clamp(&mut u);
        if saturated && !self.saturated {
            warn!(u = ?u.as_slice(), "control vector saturated");
        }
        self.saturated = saturated;
        self.u.copy_from(&u);
        Ok(u)
    }

    /// Predict over `dt`, then compute the control vector.
    pub fn update(&mut self, dt: f64, r: &DVector<f64>) -> StateSpaceResult<DVector<f64>> {
        self.predict(dt)?;
        self.control(r)
    }

    /// Predict over `dt`, correct with `y`, then compute the control vector.
    pub fn tick(
        &mut self,
        dt: f64,
        y: &DVector<f64>,
        r: &DVector<f64>,
    ) -> StateSpaceResult<DVector<f64>> {
        self.predict(dt)?;
        self.correct(y)?;
        let u = self.control(r)?;
        trace!(dt, x_hat = ?self.x_hat.as_slice(), u = ?u.as_slice(), "state-space tick");
        Ok(u)
    }
}

impl Estimator for PeriodVariantLoop {
    fn predict(&mut self, dt: f64) -> StateSpaceResult<()> {
        let (a_d, b_d) = discretize_ab(self.plant.a(), self.plant.b(), dt)?;
        self.x_hat = &a_d * &self.x_hat + &b_d * &self.u;
        self.last_dt = dt;
        Ok(())
    }

    fn correct(&mut self, y: &DVector<f64>) -> StateSpaceResult<()> {
        check_len("measurement", y, self.dims().outputs)?;
        let dt = self.last_dt;
        let gain = match self.gain.take() {
            Some((cached_dt, gain)) if cached_dt == dt => gain,
            _ => self.observer_gain(dt)?,
        };
        let innovation = y - self.plant.output(&self.x_hat, &self.u);
        self.x_hat += &gain * innovation;
        self.gain = Some((dt, gain));
        Ok(())
    }

    fn x_hat(&self) -> &DVector<f64> {
        &self.x_hat
    }
}
