//! Periodic loops on dedicated OS threads.
//!
//! A [`PeriodicThread`] owns one scheduler running on its own named thread.
//! Stopping cancels the thread's alarm and joins it; dropping the handle does
//! the same, so the thread never outlives its owner.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use sf_core::{ManualClock, SharedClock, SystemClock};
use tracing::{debug, error};

use crate::alarm::{Alarm, ScriptedAlarm, SystemAlarm};
use crate::error::{SchedError, SchedResult};
use crate::scheduler::{PeriodicScheduler, Tick};
use crate::stats::CycleStats;

/// Source of time and of fresh alarms.
///
/// A cancelled alarm is spent, so every start of a periodic thread asks the
/// timebase for a new one.
pub trait Timebase: Send + Sync {
    fn clock(&self) -> SharedClock;
    fn new_alarm(&self) -> Arc<dyn Alarm>;
}

/// Wall-clock timebase: a shared [`SystemClock`] and condvar alarms.
#[derive(Debug, Clone)]
pub struct SystemTimebase {
    clock: Arc<SystemClock>,
}

impl SystemTimebase {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
        }
    }
}

impl Default for SystemTimebase {
    fn default() -> Self {
        Self::new()
    }
}

impl Timebase for SystemTimebase {
    fn clock(&self) -> SharedClock {
        self.clock.clone()
    }

    fn new_alarm(&self) -> Arc<dyn Alarm> {
        Arc::new(SystemAlarm::new(*self.clock))
    }
}

/// Virtual-time timebase: alarms jump a shared [`ManualClock`].
///
/// Only one loop should run against a scripted timebase at a time, since
/// every alarm moves the same clock.
#[derive(Debug, Clone)]
pub struct ScriptedTimebase {
    clock: Arc<ManualClock>,
    ticks_per_run: Option<usize>,
}

impl ScriptedTimebase {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            ticks_per_run: None,
        }
    }

    /// Cancel each alarm after `n` firings.
    pub fn ticks_per_run(mut self, n: usize) -> Self {
        self.ticks_per_run = Some(n);
        self
    }

    pub fn manual_clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }
}

impl Timebase for ScriptedTimebase {
    fn clock(&self) -> SharedClock {
        self.clock.clone()
    }

    fn new_alarm(&self) -> Arc<dyn Alarm> {
        let alarm = ScriptedAlarm::new(self.clock.clone());
        match self.ticks_per_run {
            Some(n) => Arc::new(alarm.cancel_after(n)),
            None => Arc::new(alarm),
        }
    }
}

/// Handle to a scheduler running on its own thread.
pub struct PeriodicThread {
    name: String,
    alarm: Arc<dyn Alarm>,
    handle: Option<JoinHandle<SchedResult<CycleStats>>>,
}

impl std::fmt::Debug for PeriodicThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicThread")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl PeriodicThread {
    /// Spawn `scheduler` on a new thread named after it.
    ///
    /// `init` runs once on the new thread before the first arming.
    pub fn spawn<I, P>(
        scheduler: PeriodicScheduler,
        alarm: Arc<dyn Alarm>,
        init: I,
        periodic: P,
    ) -> SchedResult<Self>
    where
        I: FnOnce() -> SchedResult<()> + Send + 'static,
        P: FnMut(&Tick) + Send + 'static,
    {
        let name = scheduler.name().to_string();
        let thread_alarm = alarm.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || scheduler.start(thread_alarm.as_ref(), init, periodic))
            .map_err(|e| SchedError::Spawn {
                what: e.to_string(),
            })?;
        debug!(%name, "periodic thread spawned");
        Ok(Self {
            name,
            alarm,
            handle: Some(handle),
        })
    }

    /// Spawn on a timebase, taking a fresh alarm from it.
    pub fn spawn_on<T, I, P>(
        timebase: &T,
        scheduler: PeriodicScheduler,
        init: I,
        periodic: P,
    ) -> SchedResult<Self>
    where
        T: Timebase + ?Sized,
        I: FnOnce() -> SchedResult<()> + Send + 'static,
        P: FnMut(&Tick) + Send + 'static,
    {
        Self::spawn(scheduler, timebase.new_alarm(), init, periodic)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True until the loop has exited (stopped, cancelled or failed).
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Clock reading of this thread's alarm.
    pub fn now(&self) -> f64 {
        self.alarm.now()
    }

    /// Cancel the alarm and join the thread. Idempotent: a second call
    /// returns empty statistics.
    ///
    /// # Errors
    ///
    /// Returns the loop's own error (alarm or init failure), or
    /// [`SchedError::ThreadPanicked`] if the callback panicked.
    pub fn stop(&mut self) -> SchedResult<CycleStats> {
        self.alarm.cancel();
        let Some(handle) = self.handle.take() else {
            return Ok(CycleStats::new());
        };
        let result = handle.join().map_err(|_| SchedError::ThreadPanicked {
            name: self.name.clone(),
        })?;
        debug!(name = %self.name, "periodic thread joined");
        result
    }
}

impl Drop for PeriodicThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.stop() {
                error!(name = %self.name, error = %e, "periodic thread ended with error");
            }
        }
    }
}
