//! Drift-free periodic loop.
//!
//! `start` runs the init callback once, arms the alarm at `now + period`, and
//! then blocks on the alarm. On every firing the next target is computed from
//! the previous *target* (never from the wakeup time), and only then is the
//! periodic callback invoked. The loop ends when the alarm reports
//! cancellation (normal stop) or failure (fatal, never retried).

use sf_core::ensure_period;
use tracing::{debug, error, info, warn};

use crate::alarm::{Alarm, AlarmStatus};
use crate::error::{SchedError, SchedResult};
use crate::stats::CycleStats;

/// Timing context handed to the periodic callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Zero-based firing index.
    pub index: u64,
    /// Absolute target this firing was scheduled for.
    pub target: f64,
    /// Clock reading on wakeup.
    pub now: f64,
    /// Seconds since the previous wakeup (since arming for the first tick).
    pub dt: f64,
}

type ReadyHook = Box<dyn FnOnce() + Send>;

/// Fixed-period scheduler.
pub struct PeriodicScheduler {
    period_s: f64,
    name: String,
    on_ready: Option<ReadyHook>,
}

impl std::fmt::Debug for PeriodicScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicScheduler")
            .field("period_s", &self.period_s)
            .field("name", &self.name)
            .finish()
    }
}

impl PeriodicScheduler {
    /// Create a scheduler with the given period in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::InvalidPeriod`] for periods that are not finite,
    /// not positive, or longer than one day.
    pub fn new(period_s: f64) -> SchedResult<Self> {
        let period_s =
            ensure_period(period_s).map_err(|_| SchedError::InvalidPeriod { period: period_s })?;
        Ok(Self {
            period_s,
            name: "periodic".to_string(),
            on_ready: None,
        })
    }

    /// Name used in log events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// One-shot hook run when the alarm is armed for the first time.
    pub fn on_ready(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_ready = Some(Box::new(hook));
        self
    }

    pub fn period(&self) -> f64 {
        self.period_s
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the loop on the current thread until the alarm is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the init callback's error without arming, or
    /// [`SchedError::AlarmFailed`] when the alarm reports a failure.
    pub fn start<A, I, P>(mut self, alarm: &A, init: I, mut periodic: P) -> SchedResult<CycleStats>
    where
        A: Alarm + ?Sized,
        I: FnOnce() -> SchedResult<()>,
        P: FnMut(&Tick),
    {
        init()?;

        let mut stats = CycleStats::new();
        let mut last_wake = alarm.now();
        let mut target = last_wake + self.period_s;
        let mut index = 0u64;

        info!(name = %self.name, period_s = self.period_s, "periodic loop armed");
        if let Some(hook) = self.on_ready.take() {
            hook();
        }

        loop {
            match alarm.arm(target) {
                AlarmStatus::Fired { now } => {
                    let tick = Tick {
                        index,
                        target,
                        now,
                        dt: now - last_wake,
                    };
                    last_wake = now;
                    // Re-arm from the previous target so callback latency never drifts the cadence.
                    target += self.period_s;

                    periodic(&tick);

                    let done = alarm.now();
                    let overrun = done > target;
                    if overrun {
                        warn!(
                            name = %self.name,
                            tick = index,
                            late_s = done - target,
                            "periodic callback overran its slot"
                        );
                    }
                    stats.record(done - now, now - tick.target, overrun);
                    index += 1;
                }
                AlarmStatus::Cancelled => {
                    debug!(name = %self.name, ticks = stats.ticks, "periodic loop cancelled");
                    return Ok(stats);
                }
                AlarmStatus::Failed { reason } => {
                    error!(name = %self.name, %reason, "alarm failed; periodic loop terminated");
                    return Err(SchedError::AlarmFailed { reason });
                }
            }
        }
    }
}
