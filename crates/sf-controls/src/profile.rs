//! Reference trajectories.
//!
//! A trajectory is planned by `set_goal` and then sampled by elapsed time
//! since that call. Sampling never mutates the plan, so a trajectory can be
//! sampled from any thread and at any time, in any order.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Setpoint sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileState {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

impl ProfileState {
    pub fn at_rest(position: f64) -> Self {
        Self {
            position,
            velocity: 0.0,
            acceleration: 0.0,
        }
    }
}

/// A setpoint generator sampled by time since the goal was set.
pub trait ReferenceTrajectory: Send {
    /// Plan a move from `current` to `goal`.
    fn set_goal(&mut self, goal: f64, current: f64) -> ControlResult<()>;

    fn goal(&self) -> f64;

    /// State at `t` seconds after `set_goal`. Terminal once `t >= total_time()`.
    fn update(&self, t: f64) -> ProfileState;

    /// Duration of the planned move.
    fn total_time(&self) -> f64;

    fn is_finished(&self, t: f64) -> bool {
        t >= self.total_time()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TrapezoidPlan {
    start: f64,
    goal: f64,
    sign: f64,
    acceleration: f64,
    peak_velocity: f64,
    t_accel: f64,
    t_cruise: f64,
    total: f64,
}

impl TrapezoidPlan {
    fn at_rest(position: f64) -> Self {
        Self {
            start: position,
            goal: position,
            sign: 0.0,
            acceleration: 0.0,
            peak_velocity: 0.0,
            t_accel: 0.0,
            t_cruise: 0.0,
            total: 0.0,
        }
    }
}

/// Accelerate, cruise, decelerate.
///
/// Acceleration is `max_velocity / time_to_max_velocity`. Moves too short to
/// reach `max_velocity` collapse to a triangle peaking at `sqrt(a * |d|)`.
/// New limits apply from the next `set_goal`.
#[derive(Debug, Clone)]
pub struct TrapezoidProfile {
    max_velocity: f64,
    time_to_max_velocity: f64,
    plan: TrapezoidPlan,
}

impl TrapezoidProfile {
    pub fn new(max_velocity: f64, time_to_max_velocity: f64) -> ControlResult<Self> {
        Ok(Self {
            max_velocity: check_positive(max_velocity, "max velocity must be positive")?,
            time_to_max_velocity: check_positive(
                time_to_max_velocity,
                "time to max velocity must be positive",
            )?,
            plan: TrapezoidPlan::at_rest(0.0),
        })
    }

    pub fn set_max_velocity(&mut self, velocity: f64) -> ControlResult<()> {
        self.max_velocity = check_positive(velocity, "max velocity must be positive")?;
        Ok(())
    }

    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    pub fn set_time_to_max_velocity(&mut self, time: f64) -> ControlResult<()> {
        self.time_to_max_velocity = check_positive(time, "time to max velocity must be positive")?;
        Ok(())
    }

    pub fn time_to_max_velocity(&self) -> f64 {
        self.time_to_max_velocity
    }

    /// Peak velocity magnitude of the current plan.
    pub fn peak_velocity(&self) -> f64 {
        self.plan.peak_velocity
    }

    /// Duration of the acceleration phase (and of the deceleration phase).
    pub fn accel_time(&self) -> f64 {
        self.plan.t_accel
    }

    pub fn cruise_time(&self) -> f64 {
        self.plan.t_cruise
    }
}

fn check_positive(value: f64, what: &'static str) -> ControlResult<f64> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ControlError::InvalidArg { what })
    }
}

impl ReferenceTrajectory for TrapezoidProfile {
    fn set_goal(&mut self, goal: f64, current: f64) -> ControlResult<()> {
        if !goal.is_finite() || !current.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "goal and current position must be finite",
            });
        }
        let distance = (goal - current).abs();
        if distance == 0.0 {
            self.plan = TrapezoidPlan::at_rest(goal);
            return Ok(());
        }

        let a = self.max_velocity / self.time_to_max_velocity;
        // Distance covered by a full ramp up plus a full ramp down.
        let ramp_distance = self.max_velocity * self.max_velocity / a;
        let (peak, t_cruise) = if distance >= ramp_distance {
            (
                self.max_velocity,
                (distance - ramp_distance) / self.max_velocity,
            )
        } else {
            ((a * distance).sqrt().min(self.max_velocity), 0.0)
        };
        let t_accel = peak / a;

        self.plan = TrapezoidPlan {
            start: current,
            goal,
            sign: (goal - current).signum(),
            acceleration: a,
            peak_velocity: peak,
            t_accel,
            t_cruise,
            total: 2.0 * t_accel + t_cruise,
        };
        Ok(())
    }

    fn goal(&self) -> f64 {
        self.plan.goal
    }

    fn update(&self, t: f64) -> ProfileState {
        let p = &self.plan;
        if t >= p.total {
            return ProfileState::at_rest(p.goal);
        }
        let t = t.max(0.0);
        let a = p.acceleration;

        if t < p.t_accel {
            ProfileState {
                position: p.start + p.sign * 0.5 * a * t * t,
                velocity: p.sign * a * t,
                acceleration: p.sign * a,
            }
        } else if t < p.t_accel + p.t_cruise {
            let ramp = 0.5 * a * p.t_accel * p.t_accel;
            ProfileState {
                position: p.start + p.sign * (ramp + p.peak_velocity * (t - p.t_accel)),
                velocity: p.sign * p.peak_velocity,
                acceleration: 0.0,
            }
        } else {
            let remaining = p.total - t;
            ProfileState {
                position: p.goal - p.sign * 0.5 * a * remaining * remaining,
                velocity: p.sign * a * remaining,
                acceleration: -p.sign * a,
            }
        }
    }

    fn total_time(&self) -> f64 {
        self.plan.total
    }
}
