//! Error types for the device inventory
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for inventory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the device inventory
#[derive(Error, Debug)]
pub enum Error {
    /// The device source could not produce a snapshot (transient)
    #[error("Device source unavailable: {0}")]
    SourceUnavailable(String),

    /// The device source could not be opened at all (fatal)
    #[error("Device source initialization failed: {0}")]
    SourceInit(String),

    /// A vendor handle failed to release its resources
    #[error("Failed to dispose vendor handle for {address}: {message}")]
    Dispose {
        /// Address of the device whose handle failed
        address: String,
        /// Error message
        message: String,
    },

    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation exceeded its time limit
    #[error("Timed out: {0}")]
    Timeout(String),

    /// HTTP client errors (from vendor REST sources)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a source-unavailable error
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Create a source initialization error
    pub fn source_init(msg: impl Into<String>) -> Self {
        Self::SourceInit(msg.into())
    }

    /// Create a dispose error for the given device
    pub fn dispose(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispose {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create a scheduler error
    pub fn scheduler(msg: impl Into<String>) -> Self {
        Self::Scheduler(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether a refresh cycle may simply be retried on the next tick
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable(_) | Self::Timeout(_) | Self::Http(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
