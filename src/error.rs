//! Error types shared across the resilience primitives.
//!
//! Component-specific failures that must carry the caller's own error type
//! (for example [`CircuitBreakerError`](crate::resilience::CircuitBreakerError))
//! live next to their component. This enum covers everything else.

use crate::config::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResilienceError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),
    /// An item exhausted its retries and the error policy asked to stop.
    /// Only the message of the underlying error survives.
    #[error("Batch aborted at index {index}: {message}")]
    BatchAborted { index: usize, message: String },
}

impl From<ConfigurationError> for ResilienceError {
    fn from(error: ConfigurationError) -> Self {
        ResilienceError::ConfigurationError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ResilienceError>;
