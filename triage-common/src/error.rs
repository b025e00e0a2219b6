//! Common error types for review triage

use thiserror::Error;

/// Common result type for review triage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the triage crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited file read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write rejected because the target changed underneath the caller
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures of the backing store itself (as opposed to bad requests)
    pub fn is_store_failure(&self) -> bool {
        match self {
            #[cfg(feature = "sqlx")]
            Error::Database(_) => true,
            Error::Io(_) | Error::Csv(_) | Error::Internal(_) => true,
            _ => false,
        }
    }
}
