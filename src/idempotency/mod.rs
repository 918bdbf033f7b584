//! # Idempotency
//!
//! Deduplicates side-effecting requests by a client-supplied key. The first
//! request with a key runs; duplicates arriving while it runs are told it is in
//! progress, and duplicates arriving after it completed get the cached response.
//! Failed operations are never cached.
//!
//! The store is transport-agnostic. [`IdempotencyStore::header_name`] and
//! [`IdempotencyStore::applies_to`] carry the HTTP conventions for the caller.
//!
//! ```rust
//! use std::collections::HashMap;
//! use tasker_resilience::idempotency::{IdempotencyDecision, IdempotencyStore};
//!
//! let store = IdempotencyStore::default();
//! let key = "7c1f0e8a-create-invoice";
//!
//! if store.applies_to("POST") {
//!     match store.begin(key) {
//!         IdempotencyDecision::Proceed => {
//!             // ... perform the side effect ...
//!             store.complete(key, 201, r#"{"id":42}"#, HashMap::new());
//!         }
//!         IdempotencyDecision::InProgress => { /* respond 409 */ }
//!         IdempotencyDecision::Replay(record) => {
//!             assert_eq!(record.status_code, Some(201));
//!         }
//!     }
//! }
//! ```

pub mod record;
pub mod store;

pub use record::{IdempotencyRecord, IdempotencyStatus};
pub use store::{IdempotencyDecision, IdempotencyStore};
