//! Scaling node.

use sf_core::AtomicReal;

use crate::node::{ControlNode, NodeRef};

/// Outputs `k * input`.
pub struct GainNode {
    gain: AtomicReal,
    input: NodeRef,
}

impl GainNode {
    pub fn new(gain: f64, input: NodeRef) -> Self {
        Self {
            gain: AtomicReal::new(gain),
            input,
        }
    }

    pub fn set_gain(&self, gain: f64) {
        self.gain.set(gain);
    }

    pub fn gain(&self) -> f64 {
        self.gain.get()
    }

    /// Scale an already-evaluated input.
    #[inline]
    pub fn apply(&self, input: f64) -> f64 {
        self.gain.get() * input
    }
}

impl ControlNode for GainNode {
    fn output(&self) -> f64 {
        self.apply(self.input.output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{RefInput, node};

    #[test]
    fn scales_input() {
        let g = GainNode::new(2.5, node(RefInput::new(4.0)));
        assert_eq!(g.output(), 10.0);
        g.set_gain(-1.0);
        assert_eq!(g.output(), -4.0);
        assert_eq!(g.gain(), -1.0);
    }
}
