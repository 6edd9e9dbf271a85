//! sf-core: shared foundation for servoflow.
//!
//! Contains:
//! - atomic (lock-free f64 cell)
//! - clock (monotonic time capability + manual clock for tests)
//! - io (sensor / actuator capabilities)
//! - numeric (period and float validation, wrap-around)
//! - error (shared error types)

pub mod atomic;
pub mod clock;
pub mod error;
pub mod io;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use atomic::AtomicReal;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{SfError, SfResult};
pub use io::{Actuator, FnSensor, RecordingActuator, Sensor};
pub use numeric::*;
