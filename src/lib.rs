#![allow(clippy::doc_markdown)] // Allow technical terms like TOML, FIFO in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Resilience
//!
//! In-process concurrency control and failure handling for services that call
//! unreliable dependencies.
//!
//! ## Overview
//!
//! Every primitive is an explicitly constructed value owned by the calling
//! service. There are no global instances and nothing here coordinates across
//! processes; state lives in memory for the life of the owning value.
//!
//! ## Module Organization
//!
//! - [`concurrency`] - FIFO semaphore, mutex and named concurrency limiter
//! - [`resilience`] - Circuit breakers, breaker manager, retry with backoff
//! - [`idempotency`] - TTL-bounded request deduplication
//! - [`batch`] - Chunked concurrent processing with per-item retry
//! - [`config`] - Layered configuration loading
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tasker_resilience::config::ConfigManager;
//! use tasker_resilience::concurrency::ConcurrencyLimiter;
//! use tasker_resilience::resilience::{CircuitBreakerManager, RetryOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! tasker_resilience::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//!
//! let breakers = CircuitBreakerManager::from_config(&config.circuit_breakers);
//! let limiter = Arc::new(ConcurrencyLimiter::from_config("payments", &config.limiter));
//! let retry_options = RetryOptions::try_from(&config.retry)?;
//!
//! let payments = breakers.get_circuit_breaker("payments");
//! let receipt = tasker_resilience::resilience::retry(
//!     || {
//!         limiter.run("charge-1001", || {
//!             payments.execute(|| async { Ok::<_, std::io::Error>("receipt-1001") })
//!         })
//!     },
//!     &retry_options,
//! )
//! .await?;
//! # let _ = receipt;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib                         # Unit tests
//! cargo test                               # All tests
//! cargo bench --features benchmarks        # Criterion benchmarks
//! ```

pub mod batch;
pub mod concurrency;
pub mod config;
pub mod constants;
pub mod error;
pub mod idempotency;
pub mod logging;
pub mod resilience;

pub use batch::{BatchOptions, BatchProcessor, BatchResult, ErrorAction};
pub use concurrency::{ConcurrencyLimiter, LimiterStats, Mutex, Semaphore};
pub use config::{ConfigManager, ConfigurationError, ResilienceConfig};
pub use error::{ResilienceError, Result};
pub use idempotency::{IdempotencyDecision, IdempotencyRecord, IdempotencyStatus, IdempotencyStore};
pub use resilience::{
    retry, retry_with_result, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError,
    CircuitBreakerManager, CircuitState, RetryOptions, RetryOutcome,
};
