//! Fixed-period scheduling for control loops.
//!
//! The scheduler paces a callback from an absolute-wakeup [`Alarm`]: every
//! target is computed as `previous_target + period`, so time spent inside the
//! callback never accumulates into drift.
//!
//! - [`alarm`]: the blocking timer primitive and its implementations
//! - [`scheduler`]: the drift-free loop itself
//! - [`thread`]: a scheduler running on a dedicated, stoppable OS thread
//! - [`stats`]: per-tick timing statistics
//! - [`rt`]: optional real-time thread setup (`rt` feature)

pub mod alarm;
pub mod error;
pub mod rt;
pub mod scheduler;
pub mod stats;
pub mod thread;

pub use alarm::{Alarm, AlarmStatus, ScriptedAlarm, SystemAlarm};
pub use error::{SchedError, SchedResult};
pub use rt::rt_setup;
pub use scheduler::{PeriodicScheduler, Tick};
pub use stats::CycleStats;
pub use thread::{PeriodicThread, ScriptedTimebase, SystemTimebase, Timebase};
