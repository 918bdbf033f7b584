//! # Circuit Breaker Metrics
//!
//! Snapshot types for circuit breaker monitoring, plus the [`MetricsCollector`]
//! hook that receives state transitions and call timings as they happen.

use crate::resilience::CircuitState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// Metrics for a single circuit breaker instance
///
/// `consecutive_failures` and `consecutive_successes` are streak counters: each
/// resets when the opposite outcome is recorded. The `total_*` fields are
/// cumulative over the breaker's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Calls that reached the wrapped operation
    pub total_calls: u64,

    pub total_successes: u64,

    pub total_failures: u64,

    /// Calls refused without invoking the operation
    pub rejected_calls: u64,

    /// Current failure streak
    pub consecutive_failures: u32,

    /// Current success streak
    pub consecutive_successes: u32,

    /// Trial calls admitted during the current half-open period
    pub half_open_calls: u32,

    /// Total duration of all operations
    pub total_duration: Duration,

    /// Current circuit breaker state
    pub current_state: CircuitState,

    /// Time left before an open circuit admits trial calls
    pub next_attempt_in: Option<Duration>,

    /// Calculated failure rate (0.0 to 1.0)
    pub failure_rate: f64,

    /// Calculated success rate (0.0 to 1.0)
    pub success_rate: f64,

    /// Average operation duration
    pub average_duration: Duration,
}

impl CircuitBreakerMetrics {
    /// Create new metrics instance with zero values
    pub fn new() -> Self {
        Self {
            total_calls: 0,
            total_successes: 0,
            total_failures: 0,
            rejected_calls: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            half_open_calls: 0,
            total_duration: Duration::ZERO,
            current_state: CircuitState::Closed,
            next_attempt_in: None,
            failure_rate: 0.0,
            success_rate: 0.0,
            average_duration: Duration::ZERO,
        }
    }

    /// Fill in the derived rate and average fields from the raw counters
    pub(crate) fn with_derived_rates(mut self) -> Self {
        if self.total_calls > 0 {
            self.failure_rate = self.total_failures as f64 / self.total_calls as f64;
            self.success_rate = self.total_successes as f64 / self.total_calls as f64;
            self.average_duration =
                self.total_duration / u32::try_from(self.total_calls).unwrap_or(u32::MAX);
        }
        self
    }

    /// Closed with under 10% failures, or half-open (recovering)
    pub fn is_healthy(&self) -> bool {
        match self.current_state {
            CircuitState::Closed => self.failure_rate < 0.1,
            CircuitState::Open => false,
            CircuitState::HalfOpen => true,
        }
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CircuitBreakerMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | calls={} successes={} failures={} rejected={} avg={}ms",
            self.current_state,
            self.total_calls,
            self.total_successes,
            self.total_failures,
            self.rejected_calls,
            self.average_duration.as_millis()
        )
    }
}

/// Point-in-time view over every breaker owned by a manager, keyed by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemCircuitBreakerMetrics {
    pub circuit_breakers: BTreeMap<String, CircuitBreakerMetrics>,
    pub collected_at: DateTime<Utc>,
}

impl SystemCircuitBreakerMetrics {
    pub fn count_by_state(&self) -> HashMap<CircuitState, usize> {
        self.circuit_breakers
            .values()
            .fold(HashMap::new(), |mut counts, metrics| {
                *counts.entry(metrics.current_state).or_insert(0) += 1;
                counts
            })
    }

    /// Breakers failing [`CircuitBreakerMetrics::is_healthy`], in name order
    pub fn unhealthy_circuits(&self) -> Vec<(&str, &CircuitBreakerMetrics)> {
        self.circuit_breakers
            .iter()
            .filter(|(_, metrics)| !metrics.is_healthy())
            .map(|(name, metrics)| (name.as_str(), metrics))
            .collect()
    }

    /// Share of healthy breakers; 1.0 when there are none
    pub fn health_score(&self) -> f64 {
        if self.circuit_breakers.is_empty() {
            return 1.0;
        }

        let healthy = self
            .circuit_breakers
            .values()
            .filter(|metrics| metrics.is_healthy())
            .count();
        healthy as f64 / self.circuit_breakers.len() as f64
    }

    pub fn total_calls(&self) -> u64 {
        self.circuit_breakers.values().map(|m| m.total_calls).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.circuit_breakers.values().map(|m| m.total_failures).sum()
    }

    pub fn total_rejections(&self) -> u64 {
        self.circuit_breakers.values().map(|m| m.rejected_calls).sum()
    }

    pub fn system_failure_rate(&self) -> f64 {
        match self.total_calls() {
            0 => 0.0,
            calls => self.total_failures() as f64 / calls as f64,
        }
    }
}

impl FromIterator<(String, CircuitBreakerMetrics)> for SystemCircuitBreakerMetrics {
    fn from_iter<I: IntoIterator<Item = (String, CircuitBreakerMetrics)>>(iter: I) -> Self {
        Self {
            circuit_breakers: iter.into_iter().collect(),
            collected_at: Utc::now(),
        }
    }
}

impl fmt::Display for SystemCircuitBreakerMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.count_by_state();
        let count = |state: CircuitState| counts.get(&state).copied().unwrap_or(0);
        write!(
            f,
            "{} breakers ({} closed, {} open, {} half-open) | health {:.1}% | failure rate {:.2}%",
            self.circuit_breakers.len(),
            count(CircuitState::Closed),
            count(CircuitState::Open),
            count(CircuitState::HalfOpen),
            self.health_score() * 100.0,
            self.system_failure_rate() * 100.0
        )
    }
}

/// Observer for circuit breaker activity, for wiring into a monitoring system
pub trait MetricsCollector: Send + Sync {
    /// Called after every state change, outside the breaker's internal lock
    fn record_state_transition(&self, name: &str, from: CircuitState, to: CircuitState);

    /// Called after every call that reached the wrapped operation
    fn record_operation_timing(&self, name: &str, duration: Duration, success: bool);

    /// Called when a call is refused
    fn record_rejection(&self, name: &str, state: CircuitState);
}

/// Collector that emits everything as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetricsCollector;

impl MetricsCollector for TracingMetricsCollector {
    fn record_state_transition(&self, name: &str, from: CircuitState, to: CircuitState) {
        tracing::info!(
            circuit_breaker = name,
            from_state = %from,
            to_state = %to,
            "Circuit breaker state transition"
        );
    }

    fn record_operation_timing(&self, name: &str, duration: Duration, success: bool) {
        tracing::debug!(
            circuit_breaker = name,
            duration_ms = duration.as_millis() as u64,
            success = success,
            "Operation timing"
        );
    }

    fn record_rejection(&self, name: &str, state: CircuitState) {
        tracing::debug!(
            circuit_breaker = name,
            state = %state,
            "Call rejected"
        );
    }
}
