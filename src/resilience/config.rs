//! # Circuit Breaker Configuration
//!
//! Runtime configuration for a single circuit breaker.
//!
//! **Note**: File-based settings live in `crate::config::CircuitBreakerSettings`,
//! whose component entries convert into this struct via
//! `CircuitBreakerComponentConfig::to_resilience_config()`.

use crate::constants::circuit_breaker::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_HALF_OPEN_MAX_CALLS, DEFAULT_RESET_TIMEOUT_MS,
    MAX_FAILURE_THRESHOLD, MAX_HALF_OPEN_CALLS, MAX_RESET_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,

    /// Time to wait in open state before allowing trial calls
    pub reset_timeout: Duration,

    /// Number of trial calls admitted while half-open
    pub half_open_max_calls: u32,
}

impl CircuitBreakerConfig {
    /// Create configuration for database operations
    pub fn for_database() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_max_calls: 2,
        }
    }

    /// Create configuration for queue operations
    pub fn for_queue() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(15),
            half_open_max_calls: 1,
        }
    }

    /// Create configuration for external API calls
    pub fn for_external_api() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.failure_threshold > MAX_FAILURE_THRESHOLD {
            return Err(format!(
                "failure_threshold should not exceed {MAX_FAILURE_THRESHOLD}"
            ));
        }

        if self.reset_timeout.is_zero() {
            return Err("reset_timeout must be greater than 0".to_string());
        }

        if self.reset_timeout > Duration::from_millis(MAX_RESET_TIMEOUT_MS) {
            return Err(format!(
                "reset_timeout should not exceed {MAX_RESET_TIMEOUT_MS}ms"
            ));
        }

        if self.half_open_max_calls == 0 {
            return Err("half_open_max_calls must be greater than 0".to_string());
        }

        if self.half_open_max_calls > MAX_HALF_OPEN_CALLS {
            return Err(format!(
                "half_open_max_calls should not exceed {MAX_HALF_OPEN_CALLS}"
            ));
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: Duration::from_millis(DEFAULT_RESET_TIMEOUT_MS),
            half_open_max_calls: DEFAULT_HALF_OPEN_MAX_CALLS,
        }
    }
}
