//! # Circuit Breaker Implementation
//!
//! Guards calls to an unreliable dependency with the classic three-state
//! machine: Closed (normal operation), Open (failing fast) and Half-Open
//! (a bounded number of trial calls test recovery).
//!
//! ```text
//! Closed   → Open:      consecutive failures reach failure_threshold
//! Open     → HalfOpen:  first state query at or after next_attempt_at
//! HalfOpen → Closed:    any trial call succeeds
//! HalfOpen → Open:      any trial call fails
//! ```
//!
//! There is no background timer. The open → half-open move happens lazily when
//! `state()`, `stats()` or `execute()` next looks at the breaker.
//!
//! Once `half_open_max_calls` trials are in flight, further calls are rejected
//! with [`CircuitBreakerError::HalfOpenLimitReached`] and the breaker stays
//! half-open; the outcome of the admitted trials decides the next state. A trial
//! whose future is dropped before finishing gives its slot back.

use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics, MetricsCollector};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - limited calls allowed to test upstream health
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Circuit is half-open and every trial slot is taken
    #[error("Circuit breaker half-open call limit reached for {component}")]
    HalfOpenLimitReached { component: String },

    /// The wrapped operation failed; the original error is carried unchanged
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

impl<E> CircuitBreakerError<E> {
    /// True when the breaker refused the call without invoking the operation
    pub fn is_rejection(&self) -> bool {
        !matches!(self, CircuitBreakerError::OperationFailed(_))
    }

    /// The operation's own error, if the call got that far
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            CircuitBreakerError::OperationFailed(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_calls: u32,
    next_attempt_at: Option<Instant>,
    /// Bumped on every transition so a stale trial cannot touch a newer period
    generation: u64,
    metrics: CircuitBreakerMetrics,
}

type Transition = (CircuitState, CircuitState);

/// Circuit breaker guarding one logical dependency
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,

    config: CircuitBreakerConfig,

    /// All mutable bookkeeping, behind one lock so a check and its update
    /// cannot interleave with another task
    inner: Mutex<BreakerState>,

    collector: Option<Arc<dyn MetricsCollector>>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("inner", &self.inner)
            .field("has_collector", &self.collector.is_some())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            half_open_max_calls = config.half_open_max_calls,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                half_open_calls: 0,
                next_attempt_at: None,
                generation: 0,
                metrics: CircuitBreakerMetrics::new(),
            }),
            collector: None,
        }
    }

    /// Report transitions, timings and rejections to `collector`
    pub fn with_collector(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Current state, applying the lazy open → half-open move if it is due
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        let transition = self.refresh(&mut inner);
        let state = inner.state;
        drop(inner);

        self.announce(transition);
        state
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Open circuits and exhausted half-open budgets reject the call without
    /// invoking `operation`. Otherwise the outcome feeds the state machine and
    /// the operation's error comes back unchanged inside
    /// [`CircuitBreakerError::OperationFailed`].
    pub async fn execute<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut trial = self.admit::<E>()?;

        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();

        trial.finished = true;
        match &result {
            Ok(_) => self.record_success(duration),
            Err(_) => self.record_failure(duration),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Decide whether a call may proceed, reserving a trial slot when half-open
    fn admit<E>(&self) -> Result<AdmittedCall<'_>, CircuitBreakerError<E>> {
        let mut inner = self.inner.lock();
        let transition = self.refresh(&mut inner);

        let decision = match inner.state {
            CircuitState::Closed => Ok(None),
            CircuitState::Open => Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            }),
            CircuitState::HalfOpen => {
                if inner.half_open_calls >= self.config.half_open_max_calls {
                    Err(CircuitBreakerError::HalfOpenLimitReached {
                        component: self.name.clone(),
                    })
                } else {
                    inner.half_open_calls += 1;
                    Ok(Some(inner.generation))
                }
            }
        };

        let state = inner.state;
        if decision.is_err() {
            inner.metrics.rejected_calls += 1;
        }
        drop(inner);

        self.announce(transition);

        match decision {
            Ok(trial_generation) => Ok(AdmittedCall {
                breaker: self,
                trial_generation,
                finished: false,
            }),
            Err(rejection) => {
                debug!(component = %self.name, state = %state, "Call rejected");
                if let Some(collector) = &self.collector {
                    collector.record_rejection(&self.name, state);
                }
                Err(rejection)
            }
        }
    }

    /// Record a successful operation
    fn record_success(&self, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.total_successes += 1;
        inner.metrics.total_duration += duration;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = inner.consecutive_successes.saturating_add(1);

        let transition = match inner.state {
            CircuitState::HalfOpen => Some(self.transition_to_closed(&mut inner)),
            CircuitState::Closed => None,
            CircuitState::Open => {
                // Admitted before the circuit opened; it doesn't close it again
                debug!(component = %self.name, "Success recorded while circuit is open");
                None
            }
        };
        drop(inner);

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            "🟢 Operation succeeded"
        );
        if let Some(collector) = &self.collector {
            collector.record_operation_timing(&self.name, duration, true);
        }
        self.announce(transition);
    }

    /// Record a failed operation
    fn record_failure(&self, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.total_failures += 1;
        inner.metrics.total_duration += duration;
        inner.consecutive_successes = 0;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let transition = match inner.state {
            CircuitState::Closed
                if inner.consecutive_failures >= self.config.failure_threshold =>
            {
                Some(self.transition_to_open(&mut inner))
            }
            // Any failure in half-open state immediately opens circuit
            CircuitState::HalfOpen => Some(self.transition_to_open(&mut inner)),
            _ => None,
        };
        let consecutive_failures = inner.consecutive_failures;
        drop(inner);

        warn!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            consecutive_failures = consecutive_failures,
            "🔴 Operation failed"
        );
        if let Some(collector) = &self.collector {
            collector.record_operation_timing(&self.name, duration, false);
        }
        self.announce(transition);
    }

    /// Give back the half-open slot of a trial that never reported an outcome
    fn abandon_trial(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.generation == generation {
            inner.half_open_calls = inner.half_open_calls.saturating_sub(1);
        }
    }

    fn refresh(&self, inner: &mut BreakerState) -> Option<Transition> {
        if inner.state != CircuitState::Open {
            return None;
        }
        match inner.next_attempt_at {
            Some(next_attempt_at) if Instant::now() < next_attempt_at => None,
            _ => Some(self.transition_to_half_open(inner)),
        }
    }

    fn transition_to_closed(&self, inner: &mut BreakerState) -> Transition {
        let from = inner.state;
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.half_open_calls = 0;
        inner.next_attempt_at = None;
        inner.generation += 1;
        (from, CircuitState::Closed)
    }

    fn transition_to_open(&self, inner: &mut BreakerState) -> Transition {
        let from = inner.state;
        inner.state = CircuitState::Open;
        inner.half_open_calls = 0;
        inner.next_attempt_at = Some(Instant::now() + self.config.reset_timeout);
        inner.generation += 1;
        (from, CircuitState::Open)
    }

    fn transition_to_half_open(&self, inner: &mut BreakerState) -> Transition {
        let from = inner.state;
        inner.state = CircuitState::HalfOpen;
        inner.half_open_calls = 0;
        inner.generation += 1;
        (from, CircuitState::HalfOpen)
    }

    /// Log and publish a transition. Called with the lock released.
    fn announce(&self, transition: Option<Transition>) {
        let Some((from, to)) = transition else {
            return;
        };
        if from == to {
            return;
        }

        match to {
            CircuitState::Closed => info!(
                component = %self.name,
                from_state = %from,
                "🟢 Circuit breaker closed (recovered)"
            ),
            CircuitState::Open => error!(
                component = %self.name,
                from_state = %from,
                failure_threshold = self.config.failure_threshold,
                reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                "🔴 Circuit breaker opened (failing fast)"
            ),
            CircuitState::HalfOpen => info!(
                component = %self.name,
                half_open_max_calls = self.config.half_open_max_calls,
                "🟡 Circuit breaker half-open (testing recovery)"
            ),
        }

        if let Some(collector) = &self.collector {
            collector.record_state_transition(&self.name, from, to);
        }
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        let mut inner = self.inner.lock();
        let transition = self.transition_to_open(&mut inner);
        drop(inner);
        self.announce(Some(transition));
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        let mut inner = self.inner.lock();
        let transition = self.transition_to_closed(&mut inner);
        drop(inner);
        self.announce(Some(transition));
    }

    /// Get current metrics snapshot
    pub fn stats(&self) -> CircuitBreakerMetrics {
        let mut inner = self.inner.lock();
        let transition = self.refresh(&mut inner);

        let mut snapshot = inner.metrics.clone();
        snapshot.current_state = inner.state;
        snapshot.consecutive_failures = inner.consecutive_failures;
        snapshot.consecutive_successes = inner.consecutive_successes;
        snapshot.half_open_calls = inner.half_open_calls;
        snapshot.next_attempt_in = match inner.state {
            CircuitState::Open => inner
                .next_attempt_at
                .map(|at| at.saturating_duration_since(Instant::now())),
            _ => None,
        };
        drop(inner);

        self.announce(transition);
        snapshot.with_derived_rates()
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Check if circuit is healthy (closed state with low failure rate)
    pub fn is_healthy(&self) -> bool {
        let stats = self.stats();
        if stats.current_state != CircuitState::Closed {
            return false;
        }

        if stats.total_calls < 10 {
            // Too few calls to determine health
            return true;
        }

        stats.failure_rate < 0.1
    }
}

/// A call that passed admission. Frees its half-open slot if dropped before
/// an outcome was recorded.
struct AdmittedCall<'a> {
    breaker: &'a CircuitBreaker,
    trial_generation: Option<u64>,
    finished: bool,
}

impl Drop for AdmittedCall<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(generation) = self.trial_generation {
            self.breaker.abandon_trial(generation);
        }
    }
}
