#![allow(dead_code)]

pub mod strategies;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Install a test-friendly subscriber once; later calls are no-ops
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tasker_resilience=debug")
        .with_test_writer()
        .try_init();
}

/// Operation that fails a fixed number of times before succeeding
#[derive(Debug, Clone)]
pub struct FlakyOperation {
    failures_before_success: u32,
    calls: Arc<AtomicU32>,
    message: &'static str,
}

impl FlakyOperation {
    pub fn new(failures_before_success: u32, message: &'static str) -> Self {
        Self {
            failures_before_success,
            calls: Arc::new(AtomicU32::new(0)),
            message,
        }
    }

    /// Never succeeds
    pub fn always_failing(message: &'static str) -> Self {
        Self::new(u32::MAX, message)
    }

    pub async fn call(&self) -> Result<u32, String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures_before_success {
            Err(format!("{} (call {call})", self.message))
        } else {
            Ok(call)
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Poll `condition` until it holds, yielding to other tasks in between
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 5s"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
