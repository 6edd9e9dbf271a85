//! Output binding: drives an actuator from a node on a fixed period.

use std::sync::Arc;

use parking_lot::Mutex;
use sf_core::{Actuator, AtomicReal};
use sf_sched::Timebase;
use tracing::warn;

use crate::controller::{Schedulable, TaskSlot};
use crate::error::{ControlResult, check_range};
use crate::node::NodeRef;

struct Binding {
    source: NodeRef,
    actuator: Arc<dyn Actuator>,
    range: Mutex<(f64, f64)>,
    held: AtomicReal,
}

impl Binding {
    fn write_once(&self) -> f64 {
        let value = self.source.output();
        // Held through the write so a concurrent set_range never splits a tick.
        let range = self.range.lock();
        if value.is_nan() {
            let held = self.held.get();
            warn!(held, "output source produced NaN, holding last effort");
            return held;
        }
        let effort = value.clamp(range.0, range.1);
        self.actuator.write(effort);
        self.held.set(effort);
        effort
    }
}

/// Reads a source node each tick, clamps it into `[min, max]` and writes it
/// to an actuator. The range defaults to `[-1, 1]`.
///
/// A NaN from the source is never written: the actuator keeps the last
/// effort (zero before the first write) and that effort is returned.
pub struct Output {
    binding: Arc<Binding>,
    task: TaskSlot,
}

impl Output {
    pub fn new(
        source: NodeRef,
        actuator: Arc<dyn Actuator>,
        period_s: f64,
        timebase: Arc<dyn Timebase>,
    ) -> ControlResult<Self> {
        Ok(Self {
            binding: Arc::new(Binding {
                source,
                actuator,
                range: Mutex::new((-1.0, 1.0)),
                held: AtomicReal::new(0.0),
            }),
            task: TaskSlot::new("output", period_s, timebase)?,
        })
    }

    /// Set the clamp range. Safe while enabled.
    pub fn set_range(&self, min: f64, max: f64) -> ControlResult<()> {
        check_range(min, max)?;
        *self.binding.range.lock() = (min, max);
        Ok(())
    }

    pub fn range(&self) -> (f64, f64) {
        *self.binding.range.lock()
    }

    pub fn period(&self) -> f64 {
        self.task.period()
    }

    /// One tick of the periodic body: evaluate, clamp, write. Returns the
    /// value written.
    pub fn write_once(&self) -> f64 {
        self.binding.write_once()
    }
}

impl Schedulable for Output {
    fn enable(&self) -> ControlResult<()> {
        let binding = self.binding.clone();
        self.task.start(move |_| {
            binding.write_once();
        })
    }

    fn disable(&self) -> ControlResult<()> {
        self.task.stop()
    }

    fn is_enabled(&self) -> bool {
        self.task.is_enabled()
    }
}
