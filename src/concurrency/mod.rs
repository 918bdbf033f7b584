//! # Concurrency Module
//!
//! Bounded-parallelism primitives for a single process.
//!
//! - [`Semaphore`]: counting lock with FIFO hand-off to waiters
//! - [`Mutex`]: one-permit semaphore guarding a critical section
//! - [`ConcurrencyLimiter`]: named semaphore with running/completed/failed counters
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_resilience::concurrency::ConcurrencyLimiter;
//!
//! # async fn example() -> Result<(), String> {
//! let limiter = ConcurrencyLimiter::new("geocoding_api", 4);
//!
//! let coordinates = limiter
//!     .run("geocode-42", || async { Ok::<_, String>((52.52, 13.40)) })
//!     .await?;
//!
//! println!("{coordinates:?} {:?}", limiter.stats());
//! # Ok(())
//! # }
//! ```

pub mod limiter;
pub mod mutex;
pub mod semaphore;

pub use limiter::{ConcurrencyLimiter, LimiterStats};
pub use mutex::{Mutex, MutexGuard};
pub use semaphore::{Semaphore, SemaphorePermit};
