//! Time-based integral and derivative nodes.
//!
//! Elapsed time comes from a shared [`Clock`](sf_core::Clock) rather than a
//! fixed period, so a late tick integrates over the time that actually
//! passed. The first sample after construction or `reset` has no previous
//! timestamp and contributes `dt = 0`.

use parking_lot::Mutex;
use sf_core::SharedClock;

use crate::error::{ControlError, ControlResult};
use crate::node::{ControlNode, NodeRef};

#[derive(Debug, Clone)]
struct IntegralState {
    gain: f64,
    total: f64,
    last_time: Option<f64>,
    i_zone: f64,
    limit: f64,
}

/// Outputs `k * ∫ input dt`.
pub struct IntegralNode {
    input: NodeRef,
    clock: SharedClock,
    state: Mutex<IntegralState>,
}

impl IntegralNode {
    pub fn new(gain: f64, input: NodeRef, clock: SharedClock) -> Self {
        Self {
            input,
            clock,
            state: Mutex::new(IntegralState {
                gain,
                total: 0.0,
                last_time: None,
                i_zone: f64::INFINITY,
                limit: f64::INFINITY,
            }),
        }
    }

    pub fn set_gain(&self, gain: f64) {
        self.state.lock().gain = gain;
    }

    pub fn gain(&self) -> f64 {
        self.state.lock().gain
    }

    /// Clear the accumulator whenever `|input|` exceeds `zone`.
    pub fn set_i_zone(&self, zone: f64) -> ControlResult<()> {
        if zone.is_nan() || zone < 0.0 {
            return Err(ControlError::InvalidArg {
                what: "i-zone must be non-negative",
            });
        }
        self.state.lock().i_zone = zone;
        Ok(())
    }

    /// Clamp the accumulator to `[-limit, limit]`.
    pub fn set_integral_limit(&self, limit: f64) -> ControlResult<()> {
        if limit.is_nan() || limit < 0.0 {
            return Err(ControlError::InvalidArg {
                what: "integral limit must be non-negative",
            });
        }
        let mut state = self.state.lock();
        state.limit = limit;
        state.total = state.total.clamp(-limit, limit);
        Ok(())
    }

    /// Accumulated `∫ input dt`, before the gain.
    pub fn total(&self) -> f64 {
        self.state.lock().total
    }

    /// Fold an already-evaluated input sample into the accumulator and
    /// return `gain * total`.
    pub fn accumulate(&self, value: f64) -> f64 {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let dt = state.last_time.map_or(0.0, |last| (now - last).max(0.0));
        state.last_time = Some(now);

        if value.abs() > state.i_zone {
            state.total = 0.0;
        } else {
            let limit = state.limit;
            state.total = (state.total + value * dt).clamp(-limit, limit);
        }
        state.gain * state.total
    }
}

impl ControlNode for IntegralNode {
    fn output(&self) -> f64 {
        self.accumulate(self.input.output())
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.total = 0.0;
        state.last_time = None;
    }
}

#[derive(Debug, Clone)]
struct DerivativeState {
    gain: f64,
    last_input: f64,
    last_time: Option<f64>,
    rate: f64,
}

/// Outputs `k * (input - previous_input) / dt`.
pub struct DerivativeNode {
    input: NodeRef,
    clock: SharedClock,
    state: Mutex<DerivativeState>,
}

impl DerivativeNode {
    pub fn new(gain: f64, input: NodeRef, clock: SharedClock) -> Self {
        Self {
            input,
            clock,
            state: Mutex::new(DerivativeState {
                gain,
                last_input: 0.0,
                last_time: None,
                rate: 0.0,
            }),
        }
    }

    pub fn set_gain(&self, gain: f64) {
        self.state.lock().gain = gain;
    }

    pub fn gain(&self) -> f64 {
        self.state.lock().gain
    }

    /// Differentiate an already-evaluated input sample and return
    /// `gain * rate`.
    ///
    /// Two samples at the same instant keep the previous rate.
    pub fn differentiate(&self, value: f64) -> f64 {
        let now = self.clock.now();
        let mut state = self.state.lock();
        match state.last_time {
            None => {
                state.rate = 0.0;
                state.last_time = Some(now);
                state.last_input = value;
            }
            Some(last) if now > last => {
                state.rate = (value - state.last_input) / (now - last);
                state.last_time = Some(now);
                state.last_input = value;
            }
            Some(_) => {}
        }
        state.gain * state.rate
    }
}

impl ControlNode for DerivativeNode {
    fn output(&self) -> f64 {
        self.differentiate(self.input.output())
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.last_input = 0.0;
        state.last_time = None;
        state.rate = 0.0;
    }
}
