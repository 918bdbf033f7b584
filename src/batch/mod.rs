//! # Batch Processing
//!
//! Bounded-concurrency processing of item lists with per-item retry and an
//! abort policy.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tasker_resilience::batch::{BatchOptions, BatchProcessor, ErrorAction};
//!
//! # async fn example() -> tasker_resilience::Result<()> {
//! let processor = BatchProcessor::new(
//!     BatchOptions::default()
//!         .with_batch_size(100)
//!         .with_concurrency(8)
//!         .with_retries(2)
//!         .with_retry_delay(Duration::from_millis(250))
//!         .on_error(|_: &String, _: &u64, _| ErrorAction::Skip),
//! );
//!
//! let result = processor
//!     .process_batch(vec![1_u64, 2, 3], |user_id, _index| async move {
//!         Ok::<_, String>(format!("notified {user_id}"))
//!     })
//!     .await?;
//!
//! println!("{} sent, {} failed", result.successful.len(), result.failed.len());
//! # Ok(())
//! # }
//! ```

pub mod processor;
pub mod types;

pub use processor::BatchProcessor;
pub use types::{
    BatchFailure, BatchOptions, BatchResult, BatchSuccess, ErrorAction, ErrorHandler,
    ProgressHandler,
};
