//! Batch options, per-item outcomes and the aggregated result.

use crate::config::BatchConfig;
use crate::constants::batch::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS,
};
use crate::error::{ResilienceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Decision returned by the error hook once an item has used up its retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorAction {
    /// Record the failure and keep going
    #[default]
    Skip,
    /// Record the failure, let the current chunk finish, start nothing else
    Abort,
}

/// `(error, item, index)` of an item that failed for good
pub type ErrorHandler<T, E> = Arc<dyn Fn(&E, &T, usize) -> ErrorAction + Send + Sync>;

/// `(completed, total, item)` after each successful item
pub type ProgressHandler<T> = Arc<dyn Fn(usize, usize, &T) + Send + Sync>;

pub struct BatchOptions<T, E> {
    /// Items per sequential batch
    pub batch_size: usize,
    /// Items run together inside a batch
    pub concurrency: usize,
    /// Extra attempts per item after the first
    pub retries: u32,
    /// Base delay; attempt `n` (0-based) waits `retry_delay * 2^n` before retrying
    pub retry_delay: Duration,
    pub on_error: Option<ErrorHandler<T, E>>,
    pub on_progress: Option<ProgressHandler<T>>,
}

impl<T, E> BatchOptions<T, E> {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn on_error<H>(mut self, handler: H) -> Self
    where
        H: Fn(&E, &T, usize) -> ErrorAction + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn on_progress<H>(mut self, handler: H) -> Self
    where
        H: Fn(usize, usize, &T) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(handler));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ResilienceError::ValidationError(
                "batch_size must be at least 1".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(ResilienceError::ValidationError(
                "concurrency must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Backoff before retry number `attempt + 1`
    pub(crate) fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl<T, E> Default for BatchOptions<T, E> {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            on_error: None,
            on_progress: None,
        }
    }
}

impl<T, E> Clone for BatchOptions<T, E> {
    fn clone(&self) -> Self {
        Self {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            retries: self.retries,
            retry_delay: self.retry_delay,
            on_error: self.on_error.clone(),
            on_progress: self.on_progress.clone(),
        }
    }
}

impl<T, E> fmt::Debug for BatchOptions<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOptions")
            .field("batch_size", &self.batch_size)
            .field("concurrency", &self.concurrency)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("on_error", &self.on_error.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl<T, E> From<&BatchConfig> for BatchOptions<T, E> {
    fn from(config: &BatchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            concurrency: config.concurrency,
            retries: config.retries,
            retry_delay: config.retry_delay(),
            on_error: None,
            on_progress: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSuccess<T, R> {
    pub item: T,
    pub index: usize,
    pub result: R,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure<T, E> {
    pub item: T,
    pub index: usize,
    /// Error from the last attempt
    pub error: E,
    pub attempts: u32,
}

/// Outcome of a batch run that was not aborted
#[derive(Debug, Clone)]
pub struct BatchResult<T, R, E> {
    /// In index order
    pub successful: Vec<BatchSuccess<T, R>>,
    /// In index order
    pub failed: Vec<BatchFailure<T, E>>,
    pub total_processed: usize,
    pub duration: Duration,
}

impl<T, R, E> BatchResult<T, R, E> {
    pub(crate) fn empty() -> Self {
        Self {
            successful: Vec::new(),
            failed: Vec::new(),
            total_processed: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fraction of processed items that succeeded (1.0 for an empty batch)
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 1.0;
        }
        self.successful.len() as f64 / self.total_processed as f64
    }
}
