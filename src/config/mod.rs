//! # Configuration
//!
//! Serde-backed settings for every primitive in the crate, loaded by
//! [`ConfigManager`] from layered TOML files and environment variables.
//!
//! Every section implements `Default` from [`crate::constants`], so a missing
//! file or a partial file yields a complete configuration. `validate()` runs
//! after all layers are merged.
//!
//! ```toml
//! [limiter]
//! default_concurrency = 5
//! limits = { geocoder = 2 }
//!
//! [circuit_breakers.component_configs.database]
//! failure_threshold = 3
//! reset_timeout_ms = 10000
//! half_open_max_calls = 1
//!
//! [retry]
//! max_attempts = 4
//! retryable_errors = ["timeout", "/^HTTP 5\\d\\d/"]
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants;
use crate::resilience::retry::ErrorPattern;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration covering all primitives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub limiter: LimiterConfig,
    pub circuit_breakers: CircuitBreakerSettings,
    pub retry: RetryConfig,
    pub idempotency: IdempotencyConfig,
    pub batch: BatchConfig,
}

impl ResilienceConfig {
    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.limiter.validate()?;
        self.circuit_breakers.validate()?;
        self.retry.validate()?;
        self.idempotency.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

/// Concurrency limits per named dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Used for any limiter without an entry in `limits`
    pub default_concurrency: usize,
    pub limits: HashMap<String, usize>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            default_concurrency: constants::limiter::DEFAULT_CONCURRENCY,
            limits: HashMap::new(),
        }
    }
}

impl LimiterConfig {
    pub fn concurrency_for(&self, name: &str) -> usize {
        self.limits
            .get(name)
            .copied()
            .unwrap_or(self.default_concurrency)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "limiter.default_concurrency",
                "0",
                "must be at least 1",
            ));
        }

        for (name, limit) in &self.limits {
            if *limit == 0 {
                return Err(ConfigurationError::invalid_value(
                    format!("limiter.limits.{name}"),
                    "0",
                    "must be at least 1",
                ));
            }
        }

        Ok(())
    }
}

/// File form of a circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerComponentConfig {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerComponentConfig {
    fn default() -> Self {
        Self {
            failure_threshold: constants::circuit_breaker::DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_ms: constants::circuit_breaker::DEFAULT_RESET_TIMEOUT_MS,
            half_open_max_calls: constants::circuit_breaker::DEFAULT_HALF_OPEN_MAX_CALLS,
        }
    }
}

impl CircuitBreakerComponentConfig {
    /// Convert to the runtime form used by [`crate::resilience::CircuitBreaker`]
    pub fn to_resilience_config(&self) -> crate::resilience::CircuitBreakerConfig {
        crate::resilience::CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            half_open_max_calls: self.half_open_max_calls,
        }
    }

    fn validate(&self, field: &str) -> ConfigResult<()> {
        self.to_resilience_config()
            .validate()
            .map_err(|reason| ConfigurationError::invalid_value(field, format!("{self:?}"), reason))
    }
}

/// Circuit breaker settings with per-component overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Soft cap; the manager warns when it creates more breakers than this
    pub max_circuit_breakers: usize,

    /// Configuration for components without an explicit entry
    pub default_config: CircuitBreakerComponentConfig,

    pub component_configs: HashMap<String, CircuitBreakerComponentConfig>,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            max_circuit_breakers: constants::circuit_breaker::DEFAULT_MAX_CIRCUIT_BREAKERS,
            default_config: CircuitBreakerComponentConfig::default(),
            component_configs: HashMap::new(),
        }
    }
}

impl CircuitBreakerSettings {
    /// Get configuration for a specific component
    pub fn config_for_component(&self, component_name: &str) -> CircuitBreakerComponentConfig {
        self.component_configs
            .get(component_name)
            .cloned()
            .unwrap_or_else(|| self.default_config.clone())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_circuit_breakers == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breakers.max_circuit_breakers",
                "0",
                "must be at least 1",
            ));
        }

        self.default_config
            .validate("circuit_breakers.default_config")?;
        for (name, component) in &self.component_configs {
            component.validate(&format!("circuit_breakers.component_configs.{name}"))?;
        }

        Ok(())
    }
}

/// Retry policy defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    /// Substrings, or regular expressions written as `/pattern/`
    pub retryable_errors: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::retry::DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: constants::retry::DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: constants::retry::DEFAULT_MAX_DELAY_MS,
            backoff_factor: constants::retry::DEFAULT_BACKOFF_FACTOR,
            retryable_errors: Vec::new(),
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                "0",
                "must be at least 1",
            ));
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_factor",
                self.backoff_factor.to_string(),
                "must be a finite number >= 1.0",
            ));
        }

        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.max_delay_ms",
                self.max_delay_ms.to_string(),
                "must not be smaller than retry.initial_delay_ms",
            ));
        }

        for raw in &self.retryable_errors {
            ErrorPattern::parse(raw).map_err(|e| {
                ConfigurationError::invalid_value("retry.retryable_errors", raw.clone(), e.to_string())
            })?;
        }

        Ok(())
    }
}

/// Idempotency store and request-boundary settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    pub ttl_seconds: u64,
    /// Request header carrying the client's key
    pub header_name: String,
    /// HTTP methods that take part in idempotency handling
    pub allowed_methods: Vec<String>,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: constants::idempotency::DEFAULT_TTL_SECONDS,
            header_name: constants::idempotency::DEFAULT_HEADER_NAME.to_string(),
            allowed_methods: constants::idempotency::DEFAULT_ALLOWED_METHODS
                .iter()
                .map(|method| method.to_string())
                .collect(),
        }
    }
}

impl IdempotencyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Whether requests with this HTTP method are deduplicated (case-insensitive)
    pub fn applies_to(&self, method: &str) -> bool {
        self.allowed_methods
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(method))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "idempotency.ttl_seconds",
                "0",
                "must be at least 1",
            ));
        }

        if self.header_name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "idempotency.header_name",
                self.header_name.clone(),
                "must not be empty",
            ));
        }

        Ok(())
    }
}

/// Batch processing defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub concurrency: usize,
    /// Extra attempts per item after the first
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::batch::DEFAULT_BATCH_SIZE,
            concurrency: constants::batch::DEFAULT_CONCURRENCY,
            retries: constants::batch::DEFAULT_RETRIES,
            retry_delay_ms: constants::batch::DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl BatchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch.batch_size",
                "0",
                "must be at least 1",
            ));
        }

        if self.concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch.concurrency",
                "0",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ResilienceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limiter.default_concurrency, 5);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.idempotency.header_name, "Idempotency-Key");
        assert_eq!(config.batch.batch_size, 10);
    }

    #[test]
    fn test_concurrency_for_falls_back_to_default() {
        let mut limiter = LimiterConfig::default();
        limiter.limits.insert("geocoder".to_string(), 2);

        assert_eq!(limiter.concurrency_for("geocoder"), 2);
        assert_eq!(limiter.concurrency_for("search"), 5);
    }

    #[test]
    fn test_component_config_conversion() {
        let component = CircuitBreakerComponentConfig {
            failure_threshold: 3,
            reset_timeout_ms: 1_500,
            half_open_max_calls: 1,
        };

        let runtime = component.to_resilience_config();
        assert_eq!(runtime.failure_threshold, 3);
        assert_eq!(runtime.reset_timeout, Duration::from_millis(1_500));
        assert_eq!(runtime.half_open_max_calls, 1);
    }

    #[test]
    fn test_invalid_component_is_reported_with_field_path() {
        let mut settings = CircuitBreakerSettings::default();
        settings.component_configs.insert(
            "database".to_string(),
            CircuitBreakerComponentConfig {
                failure_threshold: 0,
                ..Default::default()
            },
        );

        let error = settings.validate().unwrap_err();
        assert!(error
            .to_string()
            .contains("circuit_breakers.component_configs.database"));
    }

    #[test]
    fn test_retry_validation() {
        let mut retry = RetryConfig {
            backoff_factor: 0.5,
            ..Default::default()
        };
        assert!(retry.validate().is_err());

        retry.backoff_factor = 2.0;
        retry.retryable_errors = vec!["/[unclosed/".to_string()];
        assert!(retry.validate().is_err());

        retry.retryable_errors = vec!["timeout".to_string(), "/^HTTP 5/".to_string()];
        assert!(retry.validate().is_ok());
    }

    #[test]
    fn test_idempotency_applies_to_is_case_insensitive() {
        let config = IdempotencyConfig::default();
        assert!(config.applies_to("POST"));
        assert!(config.applies_to("patch"));
        assert!(!config.applies_to("GET"));
        assert!(!config.applies_to("DELETE"));
    }

    #[test]
    fn test_batch_validation() {
        assert!(BatchConfig {
            batch_size: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(BatchConfig {
            concurrency: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let config: ResilienceConfig = serde_json::from_str(r#"{"batch": {"batch_size": 25}}"#).unwrap();
        assert_eq!(config.batch.batch_size, 25);
        assert_eq!(config.batch.concurrency, 5);
        assert_eq!(config.retry, RetryConfig::default());
    }
}
