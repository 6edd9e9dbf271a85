//! Controller capabilities and the periodic-task slot behind them.
//!
//! Every enable/disable-capable controller shares one state machine:
//!
//! ```text
//! Disabled --enable()--> Enabled      (spawns the periodic thread)
//! Enabled  --disable()--> Disabled    (stops and joins it)
//! ```
//!
//! Both transitions are idempotent. Disabling never touches accumulated
//! numeric state; that takes an explicit `reset`.

use std::sync::Arc;

use parking_lot::Mutex;
use sf_sched::{PeriodicScheduler, PeriodicThread, Tick, Timebase};
use tracing::debug;

use crate::error::ControlResult;

/// Enable/disable state machine.
pub trait Schedulable {
    /// Start (or keep running) the periodic thread.
    fn enable(&self) -> ControlResult<()>;

    /// Stop and join the periodic thread, blocking until it has exited.
    fn disable(&self) -> ControlResult<()>;

    fn is_enabled(&self) -> bool;
}

/// Gains and setpoint of a PID-style controller.
pub trait PidInterface {
    /// Replace all three gains in one step.
    fn set_pid(&self, p: f64, i: f64, d: f64);
    fn p(&self) -> f64;
    fn i(&self) -> f64;
    fn d(&self) -> f64;
    fn set_setpoint(&self, setpoint: f64);
    fn setpoint(&self) -> f64;
    /// Clear the integral accumulator and last-error memory.
    fn reset(&self);
}

/// Owner of at most one running [`PeriodicThread`].
pub(crate) struct TaskSlot {
    name: String,
    period_s: f64,
    timebase: Arc<dyn Timebase>,
    thread: Mutex<Option<PeriodicThread>>,
}

impl TaskSlot {
    pub(crate) fn new(
        name: impl Into<String>,
        period_s: f64,
        timebase: Arc<dyn Timebase>,
    ) -> ControlResult<Self> {
        // Validate now so a bad period surfaces at construction, not at enable.
        let period_s = PeriodicScheduler::new(period_s)?.period();
        Ok(Self {
            name: name.into(),
            period_s,
            timebase,
            thread: Mutex::new(None),
        })
    }

    pub(crate) fn period(&self) -> f64 {
        self.period_s
    }

    pub(crate) fn timebase(&self) -> &Arc<dyn Timebase> {
        &self.timebase
    }

    /// Spawn the periodic body unless already enabled.
    pub(crate) fn start<P>(&self, periodic: P) -> ControlResult<()>
    where
        P: FnMut(&Tick) + Send + 'static,
    {
        let mut slot = self.thread.lock();
        if slot.is_some() {
            return Ok(());
        }
        let scheduler = PeriodicScheduler::new(self.period_s)?.with_name(self.name.clone());
        let thread =
            PeriodicThread::spawn_on(self.timebase.as_ref(), scheduler, || Ok(()), periodic)?;
        *slot = Some(thread);
        debug!(name = %self.name, period_s = self.period_s, "enabled");
        Ok(())
    }

    /// Stop and join. No-op when already disabled.
    pub(crate) fn stop(&self) -> ControlResult<()> {
        // Join outside the lock; `is_enabled` must not block on a join.
        let thread = self.thread.lock().take();
        if let Some(mut thread) = thread {
            let stats = thread.stop()?;
            debug!(
                name = %self.name,
                ticks = stats.ticks,
                overruns = stats.overruns,
                "disabled"
            );
        }
        Ok(())
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.thread.lock().is_some()
    }
}
