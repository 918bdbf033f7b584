//! Integration tests for the batch processor

mod common;

use common::init_test_logging;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasker_resilience::batch::{BatchOptions, BatchProcessor, ErrorAction};
use tasker_resilience::config::BatchConfig;
use tasker_resilience::ResilienceError;

#[derive(Debug, Clone, PartialEq)]
struct Invoice {
    id: u32,
    amount_cents: i64,
}

fn invoices(count: u32) -> Vec<Invoice> {
    (1..=count)
        .map(|id| Invoice {
            id,
            amount_cents: i64::from(id) * 100,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_mixed_outcomes_are_aggregated() {
    init_test_logging();
    let skipped = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&skipped);
    let processor = BatchProcessor::new(
        BatchOptions::default()
            .with_batch_size(4)
            .with_concurrency(2)
            .with_retries(1)
            .with_retry_delay(Duration::from_millis(100))
            .on_error(move |error: &String, invoice: &Invoice, index| {
                log.lock().push((invoice.id, index, error.clone()));
                ErrorAction::Skip
            }),
    );

    let result = processor
        .process_batch(invoices(10), |invoice, _| async move {
            if invoice.id % 4 == 0 {
                Err(format!("invoice {} is disputed", invoice.id))
            } else {
                Ok(invoice.amount_cents)
            }
        })
        .await
        .unwrap();

    assert_eq!(result.total_processed, 10);
    assert_eq!(result.successful.len(), 8);
    assert_eq!(result.failed.len(), 2);
    assert_eq!(
        result.failed.iter().map(|f| f.index).collect::<Vec<_>>(),
        vec![3, 7]
    );
    assert!(result.failed.iter().all(|f| f.attempts == 2));
    assert_eq!(result.successful.iter().map(|s| s.result).sum::<i64>(), 4_300);
    assert!((result.success_rate() - 0.8).abs() < f64::EPSILON);

    assert_eq!(
        *skipped.lock(),
        vec![
            (4, 3, "invoice 4 is disputed".to_string()),
            (8, 7, "invoice 8 is disputed".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_abort_lets_current_chunk_finish() {
    let finished = Arc::new(Mutex::new(HashSet::new()));
    let log = Arc::clone(&finished);
    let processor = BatchProcessor::new(
        BatchOptions::default()
            .with_batch_size(10)
            .with_concurrency(3)
            .with_retries(0)
            .on_error(|_: &String, _: &Invoice, _| ErrorAction::Abort),
    );

    let error = processor
        .process_batch(invoices(9), move |invoice, _| {
            let log = Arc::clone(&log);
            async move {
                if invoice.id == 4 {
                    return Err("ledger locked".to_string());
                }
                // Siblings of the failing item are still running when it fails
                tokio::task::yield_now().await;
                log.lock().insert(invoice.id);
                Ok(())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ResilienceError::BatchAborted {
            index: 3,
            message: "ledger locked".to_string()
        }
    );

    let finished = finished.lock();
    let expected: HashSet<u32> = [1, 2, 3, 5, 6].into_iter().collect();
    assert_eq!(*finished, expected);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_item_attempts() {
    let attempts_at = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&attempts_at);
    let processor: BatchProcessor<u32, String> = BatchProcessor::new(
        BatchOptions::default()
            .with_retries(3)
            .with_retry_delay(Duration::from_millis(100)),
    );
    let origin = tokio::time::Instant::now();

    let result = processor
        .process_batch(vec![7], move |_, _| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(origin.elapsed());
                Err::<(), _>("still failing".to_string())
            }
        })
        .await
        .unwrap();

    assert_eq!(result.failed[0].attempts, 4);
    let attempts_at = attempts_at.lock();
    assert_eq!(attempts_at.len(), 4);
    for (window, expected_ms) in attempts_at.windows(2).zip([100u64, 200, 400]) {
        let gap = window[1] - window[0];
        let expected = Duration::from_millis(expected_ms);
        assert!(
            gap >= expected && gap < expected + Duration::from_millis(5),
            "{gap:?} vs {expected:?}"
        );
    }
}

#[tokio::test]
async fn test_processor_from_configuration() {
    let config = BatchConfig {
        batch_size: 3,
        concurrency: 3,
        retries: 0,
        retry_delay_ms: 0,
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let processor: BatchProcessor<Invoice, String> = BatchProcessor::from_config(&config);

    let result = processor
        .process_batch(invoices(7), move |invoice, index| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>((index, invoice.id))
            }
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 7);
    assert!(result
        .successful
        .iter()
        .all(|s| s.result == (s.index, s.item.id)));
    assert_eq!(processor.options().batch_size, 3);
}
