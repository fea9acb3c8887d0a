//! Error types for the request-security core.

use std::time::Duration;
use thiserror::Error;

/// Main error type for rampart operations.
#[derive(Error, Debug)]
pub enum RampartError {
    /// A request was rejected because its identifier exhausted the window quota.
    ///
    /// This is an expected, recoverable outcome. The HTTP layer maps it to a
    /// 429 response and performs no further work for the request.
    #[error("Rate limit exceeded for {identifier}")]
    RateLimitExceeded {
        /// The identifier whose quota was exhausted
        identifier: String,
        /// Time remaining until the window resets
        retry_after: Duration,
    },

    /// Limit, interval, or token parameters are misconfigured.
    ///
    /// Treated as a startup/programmer error; callers should surface it
    /// before serving traffic rather than at request time.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration file parse errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for rampart operations.
pub type Result<T> = std::result::Result<T, RampartError>;
