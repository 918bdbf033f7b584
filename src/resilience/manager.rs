//! # Circuit Breaker Manager
//!
//! Owns one circuit breaker per named component, creating them on first use
//! from configuration. Provides centralized control and metrics aggregation.

use crate::config::CircuitBreakerSettings;
use crate::resilience::{
    CircuitBreaker, CircuitBreakerMetrics, CircuitState, MetricsCollector,
    SystemCircuitBreakerMetrics,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry of circuit breakers keyed by component name
#[derive(Clone)]
pub struct CircuitBreakerManager {
    circuit_breakers: Arc<RwLock<HashMap<String, Arc<CircuitBreaker>>>>,
    settings: CircuitBreakerSettings,
    collector: Option<Arc<dyn MetricsCollector>>,
}

impl fmt::Debug for CircuitBreakerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerManager")
            .field("components", &self.list_components())
            .field("settings", &self.settings)
            .field("collector", &self.collector.is_some())
            .finish()
    }
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::from_config(&CircuitBreakerSettings::default())
    }
}

impl CircuitBreakerManager {
    pub fn from_config(settings: &CircuitBreakerSettings) -> Self {
        info!(
            components_configured = settings.component_configs.len(),
            max_circuit_breakers = settings.max_circuit_breakers,
            "Initializing circuit breaker manager"
        );

        Self {
            circuit_breakers: Arc::new(RwLock::new(HashMap::new())),
            settings: settings.clone(),
            collector: None,
        }
    }

    /// Attach a collector to every breaker created from now on
    pub fn with_collector(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Get or create the circuit breaker for a component
    pub fn get_circuit_breaker(&self, component_name: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.circuit_breakers.read();
            if let Some(breaker) = breakers.get(component_name) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self.circuit_breakers.write();

        // Another caller may have created it between the two locks
        if let Some(breaker) = breakers.get(component_name) {
            return Arc::clone(breaker);
        }

        if breakers.len() >= self.settings.max_circuit_breakers {
            warn!(
                component = component_name,
                current_count = breakers.len(),
                max_allowed = self.settings.max_circuit_breakers,
                "🚨 Maximum circuit breaker count exceeded"
            );
        }

        let config = self
            .settings
            .config_for_component(component_name)
            .to_resilience_config();

        let mut breaker = CircuitBreaker::new(component_name, config);
        if let Some(collector) = &self.collector {
            breaker = breaker.with_collector(Arc::clone(collector));
        }
        let breaker = Arc::new(breaker);

        breakers.insert(component_name.to_string(), Arc::clone(&breaker));

        info!(
            component = component_name,
            total_circuit_breakers = breakers.len(),
            "Created new circuit breaker"
        );

        breaker
    }

    /// Names of every breaker created so far, sorted
    pub fn list_components(&self) -> Vec<String> {
        let mut names: Vec<String> = self.circuit_breakers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_component_metrics(&self, component_name: &str) -> Option<CircuitBreakerMetrics> {
        self.circuit_breakers
            .read()
            .get(component_name)
            .map(|breaker| breaker.stats())
    }

    pub fn get_system_metrics(&self) -> SystemCircuitBreakerMetrics {
        let system_metrics: SystemCircuitBreakerMetrics = self
            .snapshot()
            .into_iter()
            .map(|(name, breaker)| (name, breaker.stats()))
            .collect();

        debug!(summary = %system_metrics, "Collected circuit breaker metrics");
        system_metrics
    }

    /// Force open all circuit breakers (emergency stop)
    pub fn force_open_all(&self) {
        warn!("🚨 Forcing all circuit breakers open (emergency stop)");

        for (name, breaker) in self.snapshot() {
            breaker.force_open();
            warn!(component = %name, "🚨 Circuit breaker forced open");
        }
    }

    /// Force close all circuit breakers (emergency recovery)
    pub fn force_close_all(&self) {
        warn!("🚨 Forcing all circuit breakers closed (emergency recovery)");

        for (name, breaker) in self.snapshot() {
            breaker.force_closed();
            warn!(component = %name, "🚨 Circuit breaker forced closed");
        }
    }

    pub fn remove_circuit_breaker(&self, component_name: &str) -> bool {
        let mut breakers = self.circuit_breakers.write();
        if breakers.remove(component_name).is_some() {
            info!(
                component = component_name,
                remaining_count = breakers.len(),
                "🗑 Removed circuit breaker"
            );
            true
        } else {
            false
        }
    }

    pub fn get_state_summary(&self) -> HashMap<CircuitState, usize> {
        self.get_system_metrics().count_by_state()
    }

    /// Fraction of breakers currently considered healthy (1.0 when none exist)
    pub fn system_health_score(&self) -> f64 {
        self.get_system_metrics().health_score()
    }

    pub fn settings(&self) -> &CircuitBreakerSettings {
        &self.settings
    }

    /// Clone the breaker handles so no registry lock is held while breakers
    /// log or notify their collector.
    fn snapshot(&self) -> Vec<(String, Arc<CircuitBreaker>)> {
        self.circuit_breakers
            .read()
            .iter()
            .map(|(name, breaker)| (name.clone(), Arc::clone(breaker)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerComponentConfig;
    use std::time::Duration;

    fn create_test_settings() -> CircuitBreakerSettings {
        let mut settings = CircuitBreakerSettings::default();
        settings.component_configs.insert(
            "database".to_string(),
            CircuitBreakerComponentConfig {
                failure_threshold: 2,
                reset_timeout_ms: 5_000,
                half_open_max_calls: 1,
            },
        );
        settings
    }

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let manager = CircuitBreakerManager::from_config(&create_test_settings());

        let first = manager.get_circuit_breaker("database");
        let second = manager.get_circuit_breaker("database");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.list_components(), vec!["database".to_string()]);
    }

    #[test]
    fn test_component_specific_configuration() {
        let settings = create_test_settings();
        let manager = CircuitBreakerManager::from_config(&settings);

        let database = manager.get_circuit_breaker("database");
        assert_eq!(database.config().failure_threshold, 2);
        assert_eq!(database.config().reset_timeout, Duration::from_millis(5_000));

        let other = manager.get_circuit_breaker("billing_api");
        assert_eq!(
            other.config().failure_threshold,
            settings.default_config.failure_threshold
        );
    }

    #[tokio::test]
    async fn test_force_all_and_metrics() {
        let manager = CircuitBreakerManager::from_config(&create_test_settings());
        manager.get_circuit_breaker("database");
        manager.get_circuit_breaker("queue");

        manager.force_open_all();
        let summary = manager.get_state_summary();
        assert_eq!(summary.get(&CircuitState::Open), Some(&2));
        assert_eq!(manager.system_health_score(), 0.0);

        manager.force_close_all();
        let summary = manager.get_state_summary();
        assert_eq!(summary.get(&CircuitState::Closed), Some(&2));
        assert_eq!(manager.system_health_score(), 1.0);

        let metrics = manager.get_component_metrics("database").unwrap();
        assert_eq!(metrics.current_state, CircuitState::Closed);
        assert!(manager.get_component_metrics("missing").is_none());
    }

    #[test]
    fn test_remove_circuit_breaker() {
        let manager = CircuitBreakerManager::default();
        let original = manager.get_circuit_breaker("search");

        assert!(manager.remove_circuit_breaker("search"));
        assert!(!manager.remove_circuit_breaker("search"));
        assert!(manager.list_components().is_empty());

        let recreated = manager.get_circuit_breaker("search");
        assert!(!Arc::ptr_eq(&original, &recreated));
    }

    #[test]
    fn test_clones_share_registry() {
        let manager = CircuitBreakerManager::default();
        let clone = manager.clone();

        let breaker = manager.get_circuit_breaker("shared");
        assert!(Arc::ptr_eq(&breaker, &clone.get_circuit_breaker("shared")));
    }
}
