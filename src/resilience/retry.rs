//! # Retry with Exponential Backoff
//!
//! Stateless helpers that re-run a fallible async operation.
//!
//! ## Backoff
//!
//! The first attempt runs immediately. Before each retry the caller sleeps for
//! `min(jitter(current_delay), max_delay)`, where jitter adds a uniform random
//! bonus of up to 20%, and `current_delay` is then multiplied by
//! `backoff_factor`. `max_delay` bounds each individual wait, not the total
//! time spent retrying.
//!
//! ## Retryability
//!
//! With an empty `retryable_errors` list every error is retried. Otherwise an
//! error whose message matches none of the patterns ends the sequence at once,
//! without waiting.

use crate::config::RetryConfig;
use crate::constants::retry::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
    JITTER_MAX_FRACTION,
};
use crate::error::{ResilienceError, Result};
use rand::Rng;
use regex::Regex;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Observer called after a failed attempt that will be retried, before the
/// sleep. Receives the error message, the attempt number that failed and the
/// delay about to be applied.
pub type RetryHook = Arc<dyn Fn(&str, u32, Duration) + Send + Sync>;

/// A rule for recognising retryable error messages
#[derive(Debug, Clone)]
pub enum ErrorPattern {
    /// Matches when the message contains the text
    Substring(String),
    /// Matches when the expression finds a match anywhere in the message
    Regex(Regex),
}

impl ErrorPattern {
    pub fn substring(text: impl Into<String>) -> Self {
        ErrorPattern::Substring(text.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(ErrorPattern::Regex)
            .map_err(|e| ResilienceError::ValidationError(format!("Invalid retry pattern: {e}")))
    }

    /// Parse a configured pattern. `/.../` denotes a regular expression,
    /// anything else is a plain substring.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(expression) if !expression.is_empty() => Self::regex(expression),
            _ => Ok(Self::substring(raw)),
        }
    }

    pub fn matches(&self, message: &str) -> bool {
        match self {
            ErrorPattern::Substring(text) => message.contains(text.as_str()),
            ErrorPattern::Regex(regex) => regex.is_match(message),
        }
    }
}

impl From<&str> for ErrorPattern {
    fn from(text: &str) -> Self {
        ErrorPattern::substring(text)
    }
}

/// Options for [`retry`] and [`retry_with_result`]
#[derive(Clone)]
pub struct RetryOptions {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Allow-list of retryable errors; empty means everything is retryable
    pub retryable_errors: Vec<ErrorPattern>,
    pub on_retry: Option<RetryHook>,
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("retryable_errors", &self.retryable_errors)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retryable_errors: Vec::new(),
            on_retry: None,
        }
    }
}

impl RetryOptions {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    pub fn with_retryable_error(mut self, pattern: impl Into<ErrorPattern>) -> Self {
        self.retryable_errors.push(pattern.into());
        self
    }

    pub fn on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(&str, u32, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ResilienceError::ValidationError(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ResilienceError::ValidationError(format!(
                "backoff_factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            )));
        }

        if self.max_delay < self.initial_delay {
            return Err(ResilienceError::ValidationError(
                "max_delay must not be shorter than initial_delay".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether an error with this message may be retried
    pub fn is_retryable(&self, message: &str) -> bool {
        self.retryable_errors.is_empty()
            || self
                .retryable_errors
                .iter()
                .any(|pattern| pattern.matches(message))
    }
}

impl TryFrom<&RetryConfig> for RetryOptions {
    type Error = ResilienceError;

    fn try_from(config: &RetryConfig) -> Result<Self> {
        let retryable_errors = config
            .retryable_errors
            .iter()
            .map(|raw| ErrorPattern::parse(raw))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            max_attempts: config.max_attempts,
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            backoff_factor: config.backoff_factor,
            retryable_errors,
            on_retry: None,
        })
    }
}

/// Outcome of [`retry_with_result`]
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// The successful value, if any attempt succeeded
    pub data: Option<T>,
    /// The last error, if every attempt failed or the error was not retryable
    pub error: Option<E>,
    /// Attempts actually made
    pub attempts: u32,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }
}

/// Jittered delay for the next retry: `current` plus up to 20%, capped at `max`
pub fn calculate_delay(current: Duration, max: Duration) -> Duration {
    let bonus = rand::thread_rng().gen_range(0.0..=JITTER_MAX_FRACTION);
    scale(current, 1.0 + bonus, max).min(max)
}

/// `duration * factor`, saturating at `ceiling` instead of overflowing
fn scale(duration: Duration, factor: f64, ceiling: Duration) -> Duration {
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).unwrap_or(ceiling)
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is used up. The last error is returned unchanged.
pub async fn retry<F, Fut, T, E>(operation: F, options: &RetryOptions) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    run_attempts(operation, options).await.0
}

/// Like [`retry`], but never fails: the outcome reports the value or the last
/// error together with the number of attempts made.
pub async fn retry_with_result<F, Fut, T, E>(operation: F, options: &RetryOptions) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    match run_attempts(operation, options).await {
        (Ok(data), attempts) => RetryOutcome {
            data: Some(data),
            error: None,
            attempts,
        },
        (Err(error), attempts) => RetryOutcome {
            data: None,
            error: Some(error),
            attempts,
        },
    }
}

async fn run_attempts<F, Fut, T, E>(
    mut operation: F,
    options: &RetryOptions,
) -> (std::result::Result<T, E>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let max_attempts = options.max_attempts.max(1);
    let mut current_delay = options.initial_delay;
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return (Ok(value), attempt);
            }
            Err(error) => error,
        };

        let message = error.to_string();
        if !options.is_retryable(&message) {
            debug!(
                attempt = attempt,
                error = %message,
                "Error is not retryable, giving up"
            );
            return (Err(error), attempt);
        }

        if attempt >= max_attempts {
            warn!(
                attempts = attempt,
                error = %message,
                "Retry attempts exhausted"
            );
            return (Err(error), attempt);
        }

        let delay = calculate_delay(current_delay, options.max_delay);
        warn!(
            attempt = attempt,
            max_attempts = max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %message,
            "Attempt failed, retrying"
        );
        if let Some(hook) = &options.on_retry {
            hook(&message, attempt, delay);
        }

        tokio::time::sleep(delay).await;
        current_delay = scale(current_delay, options.backoff_factor, options.max_delay)
            .min(options.max_delay.max(options.initial_delay));
        attempt += 1;
    }
}
