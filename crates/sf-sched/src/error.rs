//! Error types for scheduling.

use sf_core::SfError;
use thiserror::Error;

/// Result type for scheduling operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors raised while configuring or running a periodic loop.
///
/// Alarm failures are terminal: the loop that observed one has already
/// stopped by the time the error is returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedError {
    #[error("Invalid period: {period} s")]
    InvalidPeriod { period: f64 },

    #[error("Alarm failed: {reason}")]
    AlarmFailed { reason: String },

    #[error("Init callback failed: {what}")]
    Init { what: String },

    #[error("Periodic thread '{name}' panicked")]
    ThreadPanicked { name: String },

    #[error("Failed to spawn periodic thread: {what}")]
    Spawn { what: String },

    #[error("RT setup error: {what}")]
    RtSetup { what: String },

    #[error(transparent)]
    Core(#[from] SfError),
}
