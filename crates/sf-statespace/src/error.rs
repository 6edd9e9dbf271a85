//! Error types for state-space operations.

use sf_core::SfError;
use thiserror::Error;

pub type StateSpaceResult<T> = Result<T, StateSpaceError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateSpaceError {
    /// A matrix or vector does not fit the system dimensions.
    #[error("Dimension mismatch for {what}: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Coefficients that cannot be used numerically (singular, non-finite).
    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error("Core error: {0}")]
    Core(#[from] SfError),
}
