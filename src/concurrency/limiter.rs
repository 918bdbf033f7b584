//! # Concurrency Limiter
//!
//! Named wrapper around a [`Semaphore`] that caps how many tasks touch a
//! dependency at once and counts what happened to them. The counters are purely
//! observational; admission is decided by the semaphore alone.

use super::semaphore::Semaphore;
use crate::config::LimiterConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct LimiterCounters {
    running: usize,
    completed: u64,
    failed: u64,
}

/// Point-in-time view of a limiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterStats {
    pub name: String,
    pub running: usize,
    pub completed: u64,
    pub failed: u64,
    pub waiting: usize,
    pub available: usize,
}

#[derive(Debug)]
pub struct ConcurrencyLimiter {
    name: String,
    semaphore: Semaphore,
    counters: Mutex<LimiterCounters>,
}

impl ConcurrencyLimiter {
    /// # Panics
    ///
    /// Panics if `concurrency` is zero.
    pub fn new(name: impl Into<String>, concurrency: usize) -> Self {
        let name = name.into();
        info!(
            limiter = %name,
            concurrency = concurrency,
            "Concurrency limiter initialized"
        );

        Self {
            name,
            semaphore: Semaphore::new(concurrency),
            counters: Mutex::new(LimiterCounters::default()),
        }
    }

    /// Build a limiter sized from configuration, falling back to the default
    /// concurrency for names without an explicit entry.
    pub fn from_config(name: &str, config: &LimiterConfig) -> Self {
        Self::new(name, config.concurrency_for(name))
    }

    /// Run `operation` once a slot is free.
    ///
    /// The outcome is counted as completed or failed, and the slot is given
    /// back before the result (or error) reaches the caller. Cancelling the
    /// returned future also frees the slot, without touching either counter.
    pub async fn run<F, Fut, T, E>(&self, task_id: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let queued_at = Instant::now();
        let _permit = self.semaphore.acquire().await;
        let _running = RunningGuard::enter(&self.counters);

        debug!(
            limiter = %self.name,
            task_id = task_id,
            queued_ms = queued_at.elapsed().as_millis() as u64,
            "Task started"
        );

        let started_at = Instant::now();
        let result = operation().await;
        let duration_ms = started_at.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                self.counters.lock().completed += 1;
                debug!(
                    limiter = %self.name,
                    task_id = task_id,
                    duration_ms = duration_ms,
                    "Task completed"
                );
            }
            Err(error) => {
                self.counters.lock().failed += 1;
                warn!(
                    limiter = %self.name,
                    task_id = task_id,
                    duration_ms = duration_ms,
                    error = %error,
                    "Task failed"
                );
            }
        }

        result
    }

    pub fn stats(&self) -> LimiterStats {
        let counters = self.counters.lock();
        LimiterStats {
            name: self.name.clone(),
            running: counters.running,
            completed: counters.completed,
            failed: counters.failed,
            waiting: self.semaphore.waiting_count(),
            available: self.semaphore.available(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Keeps the running count accurate on every exit path
struct RunningGuard<'a> {
    counters: &'a Mutex<LimiterCounters>,
}

impl<'a> RunningGuard<'a> {
    fn enter(counters: &'a Mutex<LimiterCounters>) -> Self {
        counters.lock().running += 1;
        Self { counters }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut counters = self.counters.lock();
        counters.running = counters.running.saturating_sub(1);
    }
}
