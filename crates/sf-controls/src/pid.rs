//! PID composition and the PID controller.
//!
//! ```text
//! setpoint ──(+)──┐
//!                 Σ ── e ──> P + I + D (+ F * setpoint) ──> Output ──> actuator
//! measurement ─(-)┘
//! ```
//!
//! The error node is evaluated exactly once per tick and the same sample is
//! fed to the proportional, integral and derivative paths. The four gains are
//! read as one snapshot per tick, so `set_pid` never produces a tick that
//! mixes old and new gains.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sf_core::{Actuator, SharedClock};
use sf_sched::Timebase;
use tracing::debug;

use crate::calculus::{DerivativeNode, IntegralNode};
use crate::controller::{PidInterface, Schedulable};
use crate::error::ControlResult;
use crate::node::{ControlNode, NodeRef, RefInput};
use crate::output::Output;
use crate::sum::SumNode;

/// PID gains plus a feedforward gain on the reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    #[serde(default)]
    pub f: f64,
}

impl PidGains {
    pub fn new(p: f64, i: f64, d: f64) -> Self {
        Self { p, i, d, f: 0.0 }
    }

    pub fn with_f(mut self, f: f64) -> Self {
        self.f = f;
        self
    }
}

/// `Kp*e + Ki*∫e dt + Kd*de/dt + Kf*reference`.
pub struct PidNode {
    error: NodeRef,
    feedforward: Option<NodeRef>,
    integral: IntegralNode,
    derivative: DerivativeNode,
    gains: Mutex<PidGains>,
}

impl PidNode {
    pub fn new(gains: PidGains, error: NodeRef, clock: SharedClock) -> Self {
        Self {
            integral: IntegralNode::new(1.0, error.clone(), clock.clone()),
            derivative: DerivativeNode::new(1.0, error.clone(), clock),
            error,
            feedforward: None,
            gains: Mutex::new(gains),
        }
    }

    /// Node multiplied by `f` and added to the output.
    pub fn with_feedforward(mut self, reference: NodeRef) -> Self {
        self.feedforward = Some(reference);
        self
    }

    pub fn gains(&self) -> PidGains {
        *self.gains.lock()
    }

    pub fn set_gains(&self, gains: PidGains) {
        *self.gains.lock() = gains;
        debug!(p = gains.p, i = gains.i, d = gains.d, f = gains.f, "pid gains set");
    }

    /// Update `p`, `i`, `d` and leave `f` untouched.
    pub fn set_pid(&self, p: f64, i: f64, d: f64) {
        let mut gains = self.gains.lock();
        gains.p = p;
        gains.i = i;
        gains.d = d;
        debug!(p, i, d, "pid gains set");
    }

    pub fn set_f(&self, f: f64) {
        self.gains.lock().f = f;
    }

    /// Accumulated `∫e dt`, before `Ki`.
    pub fn integral(&self) -> f64 {
        self.integral.total()
    }

    /// Access to i-zone and integral-limit configuration.
    pub fn integral_node(&self) -> &IntegralNode {
        &self.integral
    }
}

impl ControlNode for PidNode {
    fn output(&self) -> f64 {
        let e = self.error.output();
        let integral = self.integral.accumulate(e);
        let rate = self.derivative.differentiate(e);
        let reference = self.feedforward.as_ref().map_or(0.0, |r| r.output());
        let g = *self.gains.lock();
        g.p * e + g.i * integral + g.d * rate + g.f * reference
    }

    fn reset(&self) {
        self.integral.reset();
        self.derivative.reset();
        self.error.reset();
    }
}

/// Setpoint, error junction, PID node and output binding wired together.
pub struct PidController {
    setpoint: Arc<RefInput>,
    error: Arc<SumNode>,
    pid: Arc<PidNode>,
    output: Output,
}

impl PidController {
    /// Build a controller regulating `measurement` toward the setpoint
    /// (initially 0) by writing to `actuator` every `period_s`.
    pub fn new(
        gains: PidGains,
        measurement: NodeRef,
        actuator: Arc<dyn Actuator>,
        period_s: f64,
        timebase: Arc<dyn Timebase>,
    ) -> ControlResult<Self> {
        let setpoint = Arc::new(RefInput::new(0.0));
        let error = Arc::new(SumNode::difference(setpoint.clone(), measurement));
        let pid = Arc::new(
            PidNode::new(gains, error.clone(), timebase.clock()).with_feedforward(setpoint.clone()),
        );
        let output = Output::new(pid.clone(), actuator, period_s, timebase)?;
        Ok(Self {
            setpoint,
            error,
            pid,
            output,
        })
    }

    /// Setpoint node, for feeding from a profile runner.
    pub fn setpoint_input(&self) -> Arc<RefInput> {
        self.setpoint.clone()
    }

    pub fn gains(&self) -> PidGains {
        self.pid.gains()
    }

    pub fn set_f(&self, f: f64) {
        self.pid.set_f(f);
    }

    pub fn f(&self) -> f64 {
        self.pid.gains().f
    }

    /// Error from the most recent tick.
    pub fn error(&self) -> f64 {
        self.error.last_output()
    }

    /// Accumulated `∫e dt`.
    pub fn integral(&self) -> f64 {
        self.pid.integral()
    }

    /// Whether the error is within the configured tolerances.
    pub fn on_target(&self) -> bool {
        self.error.in_tolerance()
    }

    pub fn set_absolute_tolerance(
        &self,
        tolerance: f64,
        delta_tolerance: f64,
    ) -> ControlResult<()> {
        self.error.set_tolerance(tolerance, delta_tolerance)
    }

    pub fn set_continuous(&self, continuous: bool) {
        self.error.set_continuous(continuous);
    }

    pub fn set_input_range(&self, min_input: f64, max_input: f64) -> ControlResult<()> {
        self.error.set_input_range(min_input, max_input)
    }

    pub fn set_output_range(&self, min_output: f64, max_output: f64) -> ControlResult<()> {
        self.output.set_range(min_output, max_output)
    }

    pub fn output_range(&self) -> (f64, f64) {
        self.output.range()
    }

    pub fn pid_node(&self) -> &PidNode {
        &self.pid
    }

    /// Run one tick synchronously and return the command written.
    pub fn step(&self) -> f64 {
        self.output.write_once()
    }
}

impl PidInterface for PidController {
    fn set_pid(&self, p: f64, i: f64, d: f64) {
        self.pid.set_pid(p, i, d);
    }

    fn p(&self) -> f64 {
        self.pid.gains().p
    }

    fn i(&self) -> f64 {
        self.pid.gains().i
    }

    fn d(&self) -> f64 {
        self.pid.gains().d
    }

    fn set_setpoint(&self, setpoint: f64) {
        self.setpoint.set(setpoint);
    }

    fn setpoint(&self) -> f64 {
        self.setpoint.get()
    }

    fn reset(&self) {
        self.pid.reset();
    }
}

impl Schedulable for PidController {
    fn enable(&self) -> ControlResult<()> {
        self.output.enable()
    }

    fn disable(&self) -> ControlResult<()> {
        self.output.disable()
    }

    fn is_enabled(&self) -> bool {
        self.output.is_enabled()
    }
}
