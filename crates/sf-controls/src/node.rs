//! The control node capability and its leaf nodes.
//!
//! A node produces a scalar on demand. Composite nodes hold their upstream
//! nodes as [`NodeRef`]s, so one node (typically a sensor or an error sum)
//! can feed several consumers. Nodes are shared between the thread that
//! configures them and the periodic thread that evaluates them, so mutable
//! state lives behind interior mutability.

use std::sync::Arc;

use sf_core::{AtomicReal, Sensor};

/// Control-system diagram node.
pub trait ControlNode: Send + Sync {
    /// Evaluate the node (and, transitively, its inputs).
    fn output(&self) -> f64;

    /// Clear accumulated state. Stateless nodes ignore this.
    fn reset(&self) {}
}

/// Shared handle to a node.
pub type NodeRef = Arc<dyn ControlNode>;

impl<N: ControlNode + ?Sized> ControlNode for Arc<N> {
    fn output(&self) -> f64 {
        (**self).output()
    }

    fn reset(&self) {
        (**self).reset()
    }
}

/// Settable constant, typically a setpoint.
#[derive(Debug, Default)]
pub struct RefInput {
    value: AtomicReal,
}

impl RefInput {
    pub fn new(value: f64) -> Self {
        Self {
            value: AtomicReal::new(value),
        }
    }

    pub fn set(&self, value: f64) {
        self.value.set(value);
    }

    pub fn get(&self) -> f64 {
        self.value.get()
    }
}

impl ControlNode for RefInput {
    fn output(&self) -> f64 {
        self.value.get()
    }
}

/// Node reading an external sensor on every evaluation.
pub struct SensorNode {
    sensor: Arc<dyn Sensor>,
}

impl SensorNode {
    pub fn new(sensor: Arc<dyn Sensor>) -> Self {
        Self { sensor }
    }
}

impl ControlNode for SensorNode {
    fn output(&self) -> f64 {
        self.sensor.read()
    }
}

/// Wraps an arbitrary computation; the escape hatch for anything the other
/// nodes do not express.
pub struct FuncNode<F> {
    func: F,
}

impl<F> FuncNode<F>
where
    F: Fn() -> f64 + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> ControlNode for FuncNode<F>
where
    F: Fn() -> f64 + Send + Sync,
{
    fn output(&self) -> f64 {
        (self.func)()
    }
}

/// Shorthand for `Arc::new(node) as NodeRef`.
pub fn node<N: ControlNode + 'static>(n: N) -> NodeRef {
    Arc::new(n)
}
