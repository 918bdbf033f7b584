//! # Batch Processor
//!
//! Runs a processor over a list of items: sequential batches of `batch_size`,
//! each split into chunks of `concurrency` items that run together. Every item
//! retries independently with exponential backoff.
//!
//! When the error hook answers [`ErrorAction::Abort`], the other items of the
//! current chunk still finish, then the run stops with
//! [`ResilienceError::BatchAborted`] naming the first aborting index. No later
//! chunk starts.

use super::types::{BatchFailure, BatchOptions, BatchResult, BatchSuccess, ErrorAction};
use crate::config::BatchConfig;
use crate::error::{ResilienceError, Result};
use futures::future::join_all;
use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

enum ItemOutcome<T, R, E> {
    Success(BatchSuccess<T, R>),
    Failure {
        failure: BatchFailure<T, E>,
        action: ErrorAction,
    },
}

#[derive(Debug, Clone)]
pub struct BatchProcessor<T, E> {
    options: BatchOptions<T, E>,
}

impl<T, E> BatchProcessor<T, E>
where
    T: Clone,
    E: Display,
{
    pub fn new(options: BatchOptions<T, E>) -> Self {
        Self { options }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(BatchOptions::from(config))
    }

    pub fn options(&self) -> &BatchOptions<T, E> {
        &self.options
    }

    /// Process every item, returning successes and failures in index order.
    ///
    /// The processor receives a clone of the item and its index in `items`.
    #[instrument(skip_all, fields(item_count = items.len()))]
    pub async fn process_batch<F, Fut, R>(
        &self,
        items: Vec<T>,
        processor: F,
    ) -> Result<BatchResult<T, R, E>>
    where
        F: Fn(T, usize) -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
    {
        self.options.validate()?;

        let started_at = Instant::now();
        let total = items.len();
        let completed = Mutex::new(0usize);
        let mut result = BatchResult::empty();

        info!(
            total_items = total,
            batch_size = self.options.batch_size,
            concurrency = self.options.concurrency,
            "Starting batch processing"
        );

        for (batch_number, batch) in items.chunks(self.options.batch_size).enumerate() {
            let batch_offset = batch_number * self.options.batch_size;
            debug!(
                batch_number = batch_number,
                batch_items = batch.len(),
                "Processing batch"
            );

            for (chunk_number, chunk) in batch.chunks(self.options.concurrency).enumerate() {
                let chunk_offset = batch_offset + chunk_number * self.options.concurrency;

                let outcomes = join_all(chunk.iter().enumerate().map(|(position, item)| {
                    self.process_item(
                        item.clone(),
                        chunk_offset + position,
                        &processor,
                        &completed,
                        total,
                    )
                }))
                .await;

                let mut abort: Option<(usize, String)> = None;
                for outcome in outcomes {
                    result.total_processed += 1;
                    match outcome {
                        ItemOutcome::Success(success) => result.successful.push(success),
                        ItemOutcome::Failure { failure, action } => {
                            if action == ErrorAction::Abort && abort.is_none() {
                                abort = Some((failure.index, failure.error.to_string()));
                            }
                            result.failed.push(failure);
                        }
                    }
                }

                if let Some((index, message)) = abort {
                    error!(
                        index = index,
                        processed = result.total_processed,
                        total_items = total,
                        error = %message,
                        "Batch processing aborted"
                    );
                    return Err(ResilienceError::BatchAborted { index, message });
                }
            }
        }

        result.duration = started_at.elapsed();

        info!(
            total_items = total,
            successful = result.successful.len(),
            failed = result.failed.len(),
            duration_ms = result.duration.as_millis() as u64,
            "Batch processing completed"
        );

        Ok(result)
    }

    async fn process_item<F, Fut, R>(
        &self,
        item: T,
        index: usize,
        processor: &F,
        completed: &Mutex<usize>,
        total: usize,
    ) -> ItemOutcome<T, R, E>
    where
        F: Fn(T, usize) -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
    {
        let mut attempt = 0;

        loop {
            match processor(item.clone(), index).await {
                Ok(value) => {
                    let done = {
                        let mut completed = completed.lock();
                        *completed += 1;
                        *completed
                    };
                    if let Some(on_progress) = &self.options.on_progress {
                        on_progress(done, total, &item);
                    }
                    return ItemOutcome::Success(BatchSuccess {
                        item,
                        index,
                        result: value,
                    });
                }
                Err(error) if attempt < self.options.retries => {
                    let delay = self.options.backoff_for(attempt);
                    debug!(
                        index = index,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Batch item failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    warn!(
                        index = index,
                        attempts = attempt + 1,
                        error = %error,
                        "Batch item failed"
                    );
                    let action = self
                        .options
                        .on_error
                        .as_ref()
                        .map(|on_error| on_error(&error, &item, index))
                        .unwrap_or_default();

                    return ItemOutcome::Failure {
                        failure: BatchFailure {
                            item,
                            index,
                            error,
                            attempts: attempt + 1,
                        },
                        action,
                    };
                }
            }
        }
    }
}

impl<T, E> Default for BatchProcessor<T, E>
where
    T: Clone,
    E: Display,
{
    fn default() -> Self {
        Self::new(BatchOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_doubles_items_in_index_order() {
        let processor: BatchProcessor<u32, String> = BatchProcessor::new(
            BatchOptions::default()
                .with_batch_size(2)
                .with_concurrency(1),
        );

        let result = processor
            .process_batch(vec![1, 2, 3, 4], |item, _| async move { Ok::<_, String>(item * 2) })
            .await
            .unwrap();

        let values: Vec<u32> = result.successful.iter().map(|s| s.result).collect();
        let indices: Vec<usize> = result.successful.iter().map(|s| s.index).collect();
        assert_eq!(values, vec![2, 4, 6, 8]);
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(result.failed.is_empty());
        assert_eq!(result.total_processed, 4);
        assert!(result.is_complete_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_items_are_skipped_after_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let processor: BatchProcessor<u32, String> = BatchProcessor::new(
            BatchOptions::default()
                .with_retries(2)
                .with_retry_delay(Duration::from_millis(10)),
        );

        let counter = Arc::clone(&calls);
        let result = processor
            .process_batch(vec![1, 2, 3], move |item, _| {
                let counter = Arc::clone(&counter);
                async move {
                    if item == 2 {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(format!("item {item} rejected"))
                    } else {
                        Ok(item)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result.successful.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].index, 1);
        assert_eq!(result.failed[0].attempts, 3);
        assert_eq!(result.failed[0].error, "item 2 rejected");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.total_processed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_transient_failure() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let processor: BatchProcessor<&str, String> = BatchProcessor::new(
            BatchOptions::default()
                .with_retries(1)
                .with_retry_delay(Duration::from_millis(50)),
        );

        let counter = Arc::clone(&attempts);
        let result = processor
            .process_batch(vec!["flaky"], move |item, _| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("connection reset".to_string())
                    } else {
                        Ok(item.len())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result.successful[0].result, 5);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abort_stops_later_chunks() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let processor: BatchProcessor<u32, String> = BatchProcessor::new(
            BatchOptions::default()
                .with_batch_size(4)
                .with_concurrency(2)
                .with_retries(0)
                .on_error(|_, _, _| ErrorAction::Abort),
        );

        let log = Arc::clone(&started);
        let error = processor
            .process_batch((0..8).collect(), move |item, index| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().push(index);
                    if item == 1 {
                        Err("poison item".to_string())
                    } else {
                        Ok(item)
                    }
                }
            })
            .await
            .unwrap_err();

        assert_eq!(
            error,
            ResilienceError::BatchAborted {
                index: 1,
                message: "poison item".to_string()
            }
        );
        assert_eq!(error.to_string(), "Batch aborted at index 1: poison item");

        let mut started = started.lock().clone();
        started.sort_unstable();
        assert_eq!(started, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_progress_reports_successes() {
        let progress = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&progress);
        let processor: BatchProcessor<u32, String> = BatchProcessor::new(
            BatchOptions::default()
                .with_retries(0)
                .with_concurrency(1)
                .on_progress(move |done, total, item| log.lock().push((done, total, *item))),
        );

        processor
            .process_batch(vec![10, 20, 30], |item, _| async move {
                if item == 20 {
                    Err("nope".to_string())
                } else {
                    Ok(item)
                }
            })
            .await
            .unwrap();

        assert_eq!(*progress.lock(), vec![(1, 3, 10), (2, 3, 30)]);
    }

    #[tokio::test]
    async fn test_chunk_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let processor: BatchProcessor<u32, String> = BatchProcessor::new(
            BatchOptions::default()
                .with_batch_size(6)
                .with_concurrency(3),
        );

        let (current, max) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let result = processor
            .process_batch((0..12).collect(), move |item, _| {
                let (current, max) = (Arc::clone(&current), Arc::clone(&max));
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    max.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(item)
                }
            })
            .await
            .unwrap();

        assert_eq!(result.successful.len(), 12);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_input_and_invalid_options() {
        let processor: BatchProcessor<u32, String> = BatchProcessor::default();
        let result = processor
            .process_batch(Vec::new(), |item, _| async move { Ok::<_, String>(item) })
            .await
            .unwrap();
        assert_eq!(result.total_processed, 0);
        assert_eq!(result.success_rate(), 1.0);

        let invalid: BatchProcessor<u32, String> =
            BatchProcessor::new(BatchOptions::default().with_concurrency(0));
        let error = invalid
            .process_batch(vec![1], |item, _| async move { Ok::<_, String>(item) })
            .await
            .unwrap_err();
        assert!(matches!(error, ResilienceError::ValidationError(_)));
    }
}
