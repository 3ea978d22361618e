//! Common error types for HNews

use thiserror::Error;

/// Common result type for HNews operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the HNews crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Internal error (serialization, corrupt rows)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error means the addressed resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
