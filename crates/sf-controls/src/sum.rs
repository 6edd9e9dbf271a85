//! Signed summing junction.
//!
//! The sum node is where a control error is formed (`setpoint - measurement`),
//! so it also carries the two error-shaping features controllers need:
//!
//! - **Continuous input**: for wrap-around quantities (angles) the sum is
//!   reduced modulo the input range to its smallest-magnitude representative,
//!   so the error always points along the short way round.
//! - **Tolerance**: `in_tolerance` holds when both the latest result and its
//!   change since the previous evaluation are within bounds.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sf_core::wrap_to_span;

use crate::error::{ControlError, ControlResult, check_range};
use crate::node::{ControlNode, NodeRef};

/// Whether an input is added or subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    #[inline]
    pub fn factor(self) -> f64 {
        match self {
            Sign::Plus => 1.0,
            Sign::Minus => -1.0,
        }
    }
}

#[derive(Debug, Clone)]
struct SumState {
    current: f64,
    last: f64,
    continuous: bool,
    min_input: f64,
    max_input: f64,
    tolerance: f64,
    delta_tolerance: f64,
}

impl Default for SumState {
    fn default() -> Self {
        Self {
            current: 0.0,
            last: 0.0,
            continuous: false,
            min_input: 0.0,
            max_input: 0.0,
            tolerance: f64::INFINITY,
            delta_tolerance: f64::INFINITY,
        }
    }
}

/// Outputs `Σ sign_i * input_i`, optionally wrapped into a continuous range.
pub struct SumNode {
    inputs: Vec<(NodeRef, Sign)>,
    state: Mutex<SumState>,
}

impl SumNode {
    /// Create a sum over one or more signed inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if `inputs` is empty.
    pub fn new(inputs: Vec<(NodeRef, Sign)>) -> ControlResult<Self> {
        if inputs.is_empty() {
            return Err(ControlError::InvalidArg {
                what: "sum node needs at least one input",
            });
        }
        Ok(Self {
            inputs,
            state: Mutex::new(SumState::default()),
        })
    }

    /// `plus - minus`: the usual error junction.
    pub fn difference(plus: NodeRef, minus: NodeRef) -> Self {
        Self {
            inputs: vec![(plus, Sign::Plus), (minus, Sign::Minus)],
            state: Mutex::new(SumState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Treat the result as wrapping around the input range.
    pub fn set_continuous(&self, continuous: bool) {
        self.state.lock().continuous = continuous;
    }

    pub fn is_continuous(&self) -> bool {
        self.state.lock().continuous
    }

    /// Range the inputs wrap around when continuous.
    pub fn set_input_range(&self, min_input: f64, max_input: f64) -> ControlResult<()> {
        check_range(min_input, max_input)?;
        let mut state = self.state.lock();
        state.min_input = min_input;
        state.max_input = max_input;
        Ok(())
    }

    /// Absolute bound on the result and on its change per evaluation.
    pub fn set_tolerance(&self, tolerance: f64, delta_tolerance: f64) -> ControlResult<()> {
        if tolerance.is_nan()
            || delta_tolerance.is_nan()
            || tolerance < 0.0
            || delta_tolerance < 0.0
        {
            return Err(ControlError::InvalidArg {
                what: "tolerances must be non-negative",
            });
        }
        let mut state = self.state.lock();
        state.tolerance = tolerance;
        state.delta_tolerance = delta_tolerance;
        Ok(())
    }

    /// True iff `|result| <= tolerance` and `|result - previous| <= delta_tolerance`.
    pub fn in_tolerance(&self) -> bool {
        let state = self.state.lock();
        state.current.abs() <= state.tolerance
            && (state.current - state.last).abs() <= state.delta_tolerance
    }

    /// Most recent result without re-evaluating the inputs.
    pub fn last_output(&self) -> f64 {
        self.state.lock().current
    }
}

impl ControlNode for SumNode {
    fn output(&self) -> f64 {
        // Evaluate inputs outside the lock; upstream nodes take their own locks.
        let raw: f64 = self
            .inputs
            .iter()
            .map(|(input, sign)| sign.factor() * input.output())
            .sum();

        let mut state = self.state.lock();
        let result = if state.continuous {
            wrap_to_span(raw, state.max_input - state.min_input)
        } else {
            raw
        };
        state.last = state.current;
        state.current = result;
        result
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.current = 0.0;
        state.last = 0.0;
    }
}
