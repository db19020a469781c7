//! Error types for normalcrate

use thiserror::Error;

/// Main error type for normalcrate operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed parameters or data: neighbour count out of range, mismatched
    /// point/normal counts, out-of-range root, ragged coordinates or a
    /// degenerate normal.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Shorthand for building an [`Error::InvalidInput`]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}

/// Result type alias for normalcrate operations
pub type Result<T> = std::result::Result<T, Error>;
