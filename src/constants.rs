//! # Resilience Defaults
//!
//! Default values used by configuration sections and by constructors that are
//! called without an explicit configuration.

/// Concurrency limiter defaults
pub mod limiter {
    pub const DEFAULT_CONCURRENCY: usize = 5;
}

/// Circuit breaker defaults
pub mod circuit_breaker {
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    pub const DEFAULT_RESET_TIMEOUT_MS: u64 = 60_000;
    pub const DEFAULT_HALF_OPEN_MAX_CALLS: u32 = 3;
    pub const DEFAULT_MAX_CIRCUIT_BREAKERS: usize = 50;

    pub const MAX_FAILURE_THRESHOLD: u32 = 100;
    pub const MAX_RESET_TIMEOUT_MS: u64 = 3_600_000;
    pub const MAX_HALF_OPEN_CALLS: u32 = 50;
}

/// Retry defaults
pub mod retry {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
    pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
    pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

    /// Upper bound of the random bonus added to each delay (fraction of the delay)
    pub const JITTER_MAX_FRACTION: f64 = 0.2;
}

/// Idempotency defaults
pub mod idempotency {
    pub const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60;
    pub const DEFAULT_HEADER_NAME: &str = "Idempotency-Key";
    pub const DEFAULT_ALLOWED_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];
}

/// Batch processing defaults
pub mod batch {
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    pub const DEFAULT_CONCURRENCY: usize = 5;
    pub const DEFAULT_RETRIES: u32 = 2;
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
}
