//! # Resilience Module
//!
//! Fault tolerance for calls to unreliable dependencies.
//!
//! ## Architecture
//!
//! - **Circuit Breakers**: Fail fast while a dependency is unhealthy and probe it for recovery
//! - **Manager**: One breaker per named component, created on demand from configuration
//! - **Retry**: Exponential backoff with jitter and selective retryability
//! - **Metrics Collection**: Cumulative counters plus a pluggable [`MetricsCollector`] hook
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_resilience::resilience::{retry, CircuitBreaker, CircuitBreakerConfig, RetryOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::new("inventory_api", CircuitBreakerConfig::for_external_api());
//! let options = RetryOptions::default()
//!     .with_max_attempts(4)
//!     .with_initial_delay(Duration::from_millis(200))
//!     .with_retryable_error("timeout");
//!
//! let stock = retry(
//!     || breaker.execute(|| async { Ok::<u32, std::io::Error>(12) }),
//!     &options,
//! )
//! .await?;
//! # let _ = stock;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod manager;
pub mod metrics;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use config::CircuitBreakerConfig;
pub use manager::CircuitBreakerManager;
pub use metrics::{
    CircuitBreakerMetrics, MetricsCollector, SystemCircuitBreakerMetrics, TracingMetricsCollector,
};
pub use retry::{
    calculate_delay, retry, retry_with_result, ErrorPattern, RetryHook, RetryOptions, RetryOutcome,
};
