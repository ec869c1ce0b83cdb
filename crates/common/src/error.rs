//! Common error types for the standby promoter.

use std::fmt;

/// A specialized Result type for promoter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for promoter operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signal error: {0}")]
    Signal(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new signal error.
    pub fn signal(msg: impl fmt::Display) -> Self {
        Error::Signal(msg.to_string())
    }
}
