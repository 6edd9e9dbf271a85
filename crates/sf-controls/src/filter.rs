//! Linear digital filters.
//!
//! `y[n] = Σ ff[i] * x[n-i] - Σ fb[j] * y[n-j-1]`
//!
//! The common shapes have constructors; arbitrary IIR/FIR filters can be built
//! from raw gains with [`LinearFilterNode::new`].

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::error::{ControlError, ControlResult};
use crate::node::{ControlNode, NodeRef};

#[derive(Debug, Clone, Default)]
struct FilterHistory {
    inputs: VecDeque<f64>,
    outputs: VecDeque<f64>,
}

/// IIR/FIR filter over an upstream node.
pub struct LinearFilterNode {
    input: NodeRef,
    ff_gains: Vec<f64>,
    fb_gains: Vec<f64>,
    history: Mutex<FilterHistory>,
}

impl LinearFilterNode {
    /// Filter with explicit feedforward and feedback gains.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no feedforward gains.
    pub fn new(input: NodeRef, ff_gains: Vec<f64>, fb_gains: Vec<f64>) -> ControlResult<Self> {
        if ff_gains.is_empty() {
            return Err(ControlError::InvalidArg {
                what: "filter needs at least one feedforward gain",
            });
        }
        let history = FilterHistory {
            inputs: VecDeque::with_capacity(ff_gains.len()),
            outputs: VecDeque::with_capacity(fb_gains.len()),
        };
        Ok(Self {
            input,
            ff_gains,
            fb_gains,
            history: Mutex::new(history),
        })
    }

    /// First-order low-pass with time constant `time_constant` sampled every
    /// `period_s`.
    pub fn single_pole_iir(
        input: NodeRef,
        time_constant: f64,
        period_s: f64,
    ) -> ControlResult<Self> {
        let gain = decay(time_constant, period_s)?;
        Self::new(input, vec![1.0 - gain], vec![-gain])
    }

    /// First-order high-pass.
    pub fn high_pass(input: NodeRef, time_constant: f64, period_s: f64) -> ControlResult<Self> {
        let gain = decay(time_constant, period_s)?;
        Self::new(input, vec![gain, -gain], vec![-gain])
    }

    /// Mean of the last `taps` samples.
    pub fn moving_average(input: NodeRef, taps: usize) -> ControlResult<Self> {
        if taps == 0 {
            return Err(ControlError::InvalidArg {
                what: "moving average needs at least one tap",
            });
        }
        Self::new(input, vec![1.0 / taps as f64; taps], Vec::new())
    }

    /// Push one sample through the filter.
    pub fn calculate(&self, value: f64) -> f64 {
        let mut history = self.history.lock();
        if history.inputs.len() == self.ff_gains.len() {
            history.inputs.pop_back();
        }
        history.inputs.push_front(value);

        let feedforward: f64 = self
            .ff_gains
            .iter()
            .zip(history.inputs.iter())
            .map(|(g, x)| g * x)
            .sum();
        let feedback: f64 = self
            .fb_gains
            .iter()
            .zip(history.outputs.iter())
            .map(|(g, y)| g * y)
            .sum();
        let out = feedforward - feedback;

        if !self.fb_gains.is_empty() {
            if history.outputs.len() == self.fb_gains.len() {
                history.outputs.pop_back();
            }
            history.outputs.push_front(out);
        }
        out
    }
}

fn decay(time_constant: f64, period_s: f64) -> ControlResult<f64> {
    if !(time_constant > 0.0 && time_constant.is_finite()) {
        return Err(ControlError::InvalidArg {
            what: "filter time constant must be positive",
        });
    }
    if !(period_s > 0.0 && period_s.is_finite()) {
        return Err(ControlError::InvalidArg {
            what: "filter period must be positive",
        });
    }
    Ok((-period_s / time_constant).exp())
}

impl ControlNode for LinearFilterNode {
    fn output(&self) -> f64 {
        self.calculate(self.input.output())
    }

    fn reset(&self) {
        let mut history = self.history.lock();
        history.inputs.clear();
        history.outputs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{RefInput, node};
    use std::sync::Arc;

    #[test]
    fn moving_average_of_step() {
        let input = Arc::new(RefInput::new(3.0));
        let filter = LinearFilterNode::moving_average(input.clone(), 3).unwrap();
        assert!((filter.output() - 1.0).abs() < 1e-12);
        assert!((filter.output() - 2.0).abs() < 1e-12);
        assert!((filter.output() - 3.0).abs() < 1e-12);
        assert!((filter.output() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn single_pole_converges_to_step() {
        let filter =
            LinearFilterNode::single_pole_iir(node(RefInput::new(1.0)), 0.1, 0.01).unwrap();
        let mut last = 0.0;
        for _ in 0..200 {
            let y = filter.output();
            assert!(y >= last && y <= 1.0 + 1e-12);
            last = y;
        }
        assert!((last - 1.0).abs() < 1e-6);
    }

    #[test]
    fn high_pass_decays_on_constant_input() {
        let filter = LinearFilterNode::high_pass(node(RefInput::new(1.0)), 0.1, 0.01).unwrap();
        let first = filter.output();
        assert!(first > 0.8);
        let mut y = first;
        for _ in 0..500 {
            y = filter.output();
        }
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn reset_clears_history() {
        let filter = LinearFilterNode::moving_average(node(RefInput::new(2.0)), 2).unwrap();
        filter.output();
        filter.output();
        filter.reset();
        assert!((filter.output() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_filters_rejected() {
        assert!(LinearFilterNode::moving_average(node(RefInput::new(0.0)), 0).is_err());
        assert!(LinearFilterNode::single_pole_iir(node(RefInput::new(0.0)), 0.0, 0.01).is_err());
        assert!(LinearFilterNode::high_pass(node(RefInput::new(0.0)), 0.1, -1.0).is_err());
        assert!(LinearFilterNode::new(node(RefInput::new(0.0)), Vec::new(), vec![1.0]).is_err());
    }
}
