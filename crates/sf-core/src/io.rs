//! Sensor and actuator capabilities.
//!
//! These are the narrow seams to the hardware layer: a sensor yields a
//! scalar on demand and an actuator accepts a scalar effort.

use std::sync::Arc;

use parking_lot::Mutex;

/// Scalar measurement source.
pub trait Sensor: Send + Sync {
    fn read(&self) -> f64;
}

/// Scalar effort sink.
pub trait Actuator: Send + Sync {
    fn write(&self, effort: f64);
}

/// Adapts a closure into a [`Sensor`].
pub struct FnSensor<F>(pub F);

impl<F> Sensor for FnSensor<F>
where
    F: Fn() -> f64 + Send + Sync,
{
    fn read(&self) -> f64 {
        (self.0)()
    }
}

impl<S: Sensor + ?Sized> Sensor for Arc<S> {
    fn read(&self) -> f64 {
        (**self).read()
    }
}

impl<A: Actuator + ?Sized> Actuator for Arc<A> {
    fn write(&self, effort: f64) {
        (**self).write(effort)
    }
}

/// Actuator that keeps every value written to it.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    writes: Mutex<Vec<f64>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent effort, if any.
    pub fn last(&self) -> Option<f64> {
        self.writes.lock().last().copied()
    }

    pub fn writes(&self) -> Vec<f64> {
        self.writes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.lock().is_empty()
    }
}

impl Actuator for RecordingActuator {
    fn write(&self, effort: f64) {
        self.writes.lock().push(effort);
    }
}
