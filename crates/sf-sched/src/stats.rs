//! Per-tick timing statistics.

/// O(1) per-tick timing statistics.
///
/// Updated on every firing with no allocation. Latency is the distance
/// between the absolute target and the actual wakeup; busy time is how long
/// the callback ran.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleStats {
    /// Ticks executed.
    pub ticks: u64,
    /// Ticks whose callback finished after the next target.
    pub overruns: u64,
    /// Last callback duration [s].
    pub last_busy_s: f64,
    /// Maximum callback duration [s].
    pub max_busy_s: f64,
    /// Running sum of callback durations [s].
    pub sum_busy_s: f64,
    /// Maximum wake-up latency [s].
    pub max_latency_s: f64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            ticks: 0,
            overruns: 0,
            last_busy_s: 0.0,
            max_busy_s: 0.0,
            sum_busy_s: 0.0,
            max_latency_s: 0.0,
        }
    }

    /// Record one tick. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, busy_s: f64, latency_s: f64, overrun: bool) {
        self.ticks += 1;
        self.last_busy_s = busy_s;
        self.max_busy_s = self.max_busy_s.max(busy_s);
        self.sum_busy_s += busy_s;
        self.max_latency_s = self.max_latency_s.max(latency_s);
        if overrun {
            self.overruns += 1;
        }
    }

    /// Average callback duration [s] (0 if no ticks).
    #[inline]
    pub fn avg_busy_s(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.sum_busy_s / self.ticks as f64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}
