//! Error type for the command line driver.

use std::path::PathBuf;

use sf_controls::ControlError;
use sf_sched::SchedError;
use sf_statespace::StateSpaceError;

pub type CliResult<T> = Result<T, CliError>;

/// Every failure the CLI can report, wrapping the library errors.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to read loop file: {path}")]
    LoopFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse loop file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("State-space error: {0}")]
    StateSpace(#[from] StateSpaceError),

    #[error("Scheduler error: {0}")]
    Sched(#[from] SchedError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
