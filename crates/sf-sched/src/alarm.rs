//! Absolute-wakeup alarm primitive.
//!
//! An [`Alarm`] blocks the calling thread until a target timestamp on its
//! clock is reached, or until it is cancelled from another thread. Once
//! cancelled, an alarm stays cancelled: every later [`Alarm::arm`] returns
//! [`AlarmStatus::Cancelled`] immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};
use sf_core::{Clock, ManualClock, SystemClock};

/// Outcome of a blocking [`Alarm::arm`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum AlarmStatus {
    /// The target was reached; `now` is the clock reading on wakeup.
    Fired { now: f64 },
    /// The alarm was cancelled before or during the wait.
    Cancelled,
    /// The underlying timer reported an error.
    Failed { reason: String },
}

/// Blocking timer keyed on absolute time (seconds on the alarm's clock).
pub trait Alarm: Send + Sync {
    /// Block until `target_s` is reached or the alarm is cancelled.
    fn arm(&self, target_s: f64) -> AlarmStatus;

    /// Wake any waiter and make all subsequent `arm` calls return `Cancelled`.
    fn cancel(&self);

    fn is_cancelled(&self) -> bool;

    /// Current reading of the clock the alarm waits against.
    fn now(&self) -> f64;
}

/// Alarm backed by a condition variable waiting on an absolute deadline.
#[derive(Debug)]
pub struct SystemAlarm {
    clock: SystemClock,
    cancelled: Mutex<bool>,
    wakeup: Condvar,
}

impl SystemAlarm {
    pub fn new(clock: SystemClock) -> Self {
        Self {
            clock,
            cancelled: Mutex::new(false),
            wakeup: Condvar::new(),
        }
    }
}

impl Alarm for SystemAlarm {
    fn arm(&self, target_s: f64) -> AlarmStatus {
        if !target_s.is_finite() {
            return AlarmStatus::Failed {
                reason: format!("non-finite alarm target {target_s}"),
            };
        }
        let deadline = self.clock.instant_at(target_s);
        let mut cancelled = self.cancelled.lock();
        loop {
            if *cancelled {
                return AlarmStatus::Cancelled;
            }
            let now = self.clock.now();
            if now >= target_s {
                return AlarmStatus::Fired { now };
            }
            // Spurious wakeups and timeouts both fall through to the checks above.
            self.wakeup.wait_until(&mut cancelled, deadline);
        }
    }

    fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.wakeup.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }

    fn now(&self) -> f64 {
        self.clock.now()
    }
}

/// Deterministic alarm over a [`ManualClock`].
///
/// Each `arm` jumps the clock straight to the target (plus an optional fixed
/// wake latency) and records the target. It can be scripted to cancel or fail
/// after a given number of firings, which makes drift and failure behaviour
/// testable without wall-clock sleeps.
#[derive(Debug)]
pub struct ScriptedAlarm {
    clock: Arc<ManualClock>,
    latency_s: f64,
    cancel_after: Option<usize>,
    fail_after: Option<usize>,
    fired: AtomicUsize,
    cancelled: AtomicBool,
    targets: Mutex<Vec<f64>>,
}

impl ScriptedAlarm {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            latency_s: 0.0,
            cancel_after: None,
            fail_after: None,
            fired: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Wake this many seconds after each target.
    pub fn with_latency(mut self, latency_s: f64) -> Self {
        self.latency_s = latency_s;
        self
    }

    /// Report `Cancelled` once `n` firings have happened.
    pub fn cancel_after(mut self, n: usize) -> Self {
        self.cancel_after = Some(n);
        self
    }

    /// Report `Failed` once `n` firings have happened.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Every target passed to `arm`, in order.
    pub fn targets(&self) -> Vec<f64> {
        self.targets.lock().clone()
    }

    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::Acquire)
    }
}

impl Alarm for ScriptedAlarm {
    fn arm(&self, target_s: f64) -> AlarmStatus {
        self.targets.lock().push(target_s);
        if self.cancelled.load(Ordering::Acquire) {
            return AlarmStatus::Cancelled;
        }
        let fired = self.fired.load(Ordering::Acquire);
        if self.fail_after.is_some_and(|n| fired >= n) {
            return AlarmStatus::Failed {
                reason: format!("scripted failure after {fired} firings"),
            };
        }
        if self.cancel_after.is_some_and(|n| fired >= n) {
            self.cancelled.store(true, Ordering::Release);
            return AlarmStatus::Cancelled;
        }
        // The clock never moves backwards, even if the target is already past.
        let now = self.clock.now().max(target_s + self.latency_s);
        self.clock.set(now);
        self.fired.fetch_add(1, Ordering::AcqRel);
        AlarmStatus::Fired { now }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn now(&self) -> f64 {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn system_alarm_fires_after_target() {
        let alarm = SystemAlarm::new(SystemClock::new());
        let target = alarm.now() + 0.01;
        match alarm.arm(target) {
            AlarmStatus::Fired { now } => assert!(now >= target),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn system_alarm_cancel_wakes_waiter() {
        let alarm = Arc::new(SystemAlarm::new(SystemClock::new()));
        let waiter = {
            let alarm = alarm.clone();
            thread::spawn(move || alarm.arm(alarm.now() + 60.0))
        };
        thread::sleep(Duration::from_millis(20));
        alarm.cancel();
        let status = waiter.join().unwrap();
        assert_eq!(status, AlarmStatus::Cancelled);
        assert!(alarm.is_cancelled());
        assert_eq!(alarm.arm(0.0), AlarmStatus::Cancelled);
    }

    #[test]
    fn system_alarm_far_target_waits_until_cancelled() {
        let alarm = Arc::new(SystemAlarm::new(SystemClock::new()));
        let waiter = {
            let alarm = alarm.clone();
            thread::spawn(move || alarm.arm(1e30))
        };
        thread::sleep(Duration::from_millis(20));
        alarm.cancel();
        assert_eq!(waiter.join().unwrap(), AlarmStatus::Cancelled);
    }

    #[test]
    fn system_alarm_rejects_nan_target() {
        let alarm = SystemAlarm::new(SystemClock::new());
        assert!(matches!(alarm.arm(f64::NAN), AlarmStatus::Failed { .. }));
    }

    #[test]
    fn scripted_alarm_jumps_clock() {
        let clock = Arc::new(ManualClock::new(0.0));
        let alarm = ScriptedAlarm::new(clock.clone()).with_latency(0.001);
        assert_eq!(alarm.arm(0.5), AlarmStatus::Fired { now: 0.501 });
        assert_eq!(clock.now(), 0.501);
        assert_eq!(alarm.targets(), vec![0.5]);
        assert_eq!(alarm.fired(), 1);
    }

    #[test]
    fn scripted_alarm_cancel_and_fail() {
        let clock = Arc::new(ManualClock::new(0.0));
        let alarm = ScriptedAlarm::new(clock.clone()).cancel_after(1);
        assert!(matches!(alarm.arm(1.0), AlarmStatus::Fired { .. }));
        assert_eq!(alarm.arm(2.0), AlarmStatus::Cancelled);
        assert_eq!(alarm.arm(3.0), AlarmStatus::Cancelled);

        let alarm = ScriptedAlarm::new(clock).fail_after(0);
        assert!(matches!(alarm.arm(1.0), AlarmStatus::Failed { .. }));
    }
}
