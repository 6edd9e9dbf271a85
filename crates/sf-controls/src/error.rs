//! Error types for control system operations.

use sf_sched::SchedError;
use thiserror::Error;

/// Result type for control system operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in control system operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Range whose minimum exceeds its maximum.
    #[error("Invalid range: [{min}, {max}]")]
    InvalidRange { min: f64, max: f64 },

    /// Operation not permitted in the current controller state.
    #[error("Usage error: {what}")]
    Usage { what: String },

    /// The periodic thread could not be started or stopped cleanly.
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedError),
}

/// Validate a `[min, max]` range.
pub(crate) fn check_range(min: f64, max: f64) -> ControlResult<()> {
    if min.is_nan() || max.is_nan() || min > max {
        return Err(ControlError::InvalidRange { min, max });
    }
    Ok(())
}
