//! Monotonic time sources.
//!
//! Every time-dependent primitive (integral/derivative nodes, profiles,
//! alarms) reads elapsed seconds through [`Clock`] so that tests can drive
//! time by hand with [`ManualClock`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::atomic::AtomicReal;

/// Monotonic time source returning elapsed seconds.
pub trait Clock: Send + Sync {
    /// Seconds since this clock's epoch. Never decreases.
    fn now(&self) -> f64;
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Latest offset [`SystemClock::instant_at`] resolves to (about 100 years).
pub const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 86_400);

/// Wall clock backed by [`Instant`], epoch at construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// The instant corresponding to `t` seconds on this clock. Negative
    /// times map to the epoch; times past [`FAR_FUTURE`] saturate to it.
    pub fn instant_at(&self, t: f64) -> Instant {
        let offset = Duration::try_from_secs_f64(t.max(0.0))
            .unwrap_or(FAR_FUTURE)
            .min(FAR_FUTURE);
        self.epoch + offset
    }

    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Clock advanced explicitly by the caller.
///
/// Shared across threads without a lock.
#[derive(Debug, Default)]
pub struct ManualClock {
    t: AtomicReal,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            t: AtomicReal::new(start),
        }
    }

    pub fn set(&self, t: f64) {
        self.t.set(t);
    }

    pub fn advance(&self, dt: f64) {
        let now = self.now();
        self.set(now + dt);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.t.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1.5);
        assert_eq!(clock.now(), 1.5);
        clock.advance(0.25);
        assert_eq!(clock.now(), 1.75);
        clock.set(10.0);
        assert_eq!(clock.now(), 10.0);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a >= 0.0);
    }

    #[test]
    fn instant_at_saturates() {
        let clock = SystemClock::new();
        assert_eq!(clock.instant_at(-5.0), clock.instant_at(0.0));
        assert_eq!(clock.instant_at(1e30), clock.instant_at(f64::INFINITY));
        assert_eq!(clock.instant_at(f64::NAN), clock.instant_at(0.0));
        assert!(clock.instant_at(1e30) > clock.instant_at(1.0));
    }

    #[test]
    fn shared_clock_delegates() {
        let manual = Arc::new(ManualClock::new(2.0));
        let shared: SharedClock = manual.clone();
        manual.advance(1.0);
        assert_eq!(shared.now(), 3.0);
    }
}
