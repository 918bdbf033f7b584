use proptest::prelude::*;
use std::time::Duration;
use tasker_resilience::config::BatchConfig;

/// Strategy for generating retry schedules: (initial delay, max delay, factor)
pub fn backoff_schedule_strategy() -> impl Strategy<Value = (Duration, Duration, f64)> {
    (1u64..5_000, 0u64..60_000, 1.0f64..4.0).prop_map(|(initial_ms, extra_ms, factor)| {
        (
            Duration::from_millis(initial_ms),
            Duration::from_millis(initial_ms + extra_ms),
            factor,
        )
    })
}

/// Strategy for generating valid batch configurations
pub fn batch_config_strategy() -> impl Strategy<Value = BatchConfig> {
    (1usize..16, 1usize..8, 0u32..3).prop_map(|(batch_size, concurrency, retries)| BatchConfig {
        batch_size,
        concurrency,
        retries,
        retry_delay_ms: 0,
    })
}

/// A sequence of permit operations against a semaphore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitOp {
    TryAcquire,
    DropOldest,
    DropNewest,
}

pub fn permit_ops_strategy() -> impl Strategy<Value = Vec<PermitOp>> {
    prop::collection::vec(
        prop_oneof![
            Just(PermitOp::TryAcquire),
            Just(PermitOp::DropOldest),
            Just(PermitOp::DropNewest),
        ],
        0..64,
    )
}

/// Strategy for generating circuit breaker component names
pub fn component_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,31}"
}
