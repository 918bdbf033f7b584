//! # Idempotency Store
//!
//! In-memory, TTL-bounded map from client keys to cached responses. Expired
//! records are swept on every call that reads the map; there is no background
//! task.

use super::record::IdempotencyRecord;
use crate::config::IdempotencyConfig;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a request boundary should do with an incoming key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyDecision {
    /// No live record existed; one is now `Processing` and the caller owns it
    Proceed,
    /// Another request with this key is still running
    InProgress,
    /// The operation already completed; reply with the cached response
    Replay(IdempotencyRecord),
}

#[derive(Debug)]
pub struct IdempotencyStore {
    records: DashMap<String, IdempotencyRecord>,
    ttl: Duration,
    config: IdempotencyConfig,
}

impl IdempotencyStore {
    pub fn new(config: IdempotencyConfig) -> Self {
        Self::with_ttl(config.ttl(), config)
    }

    /// Store with an explicit TTL, for windows the seconds-based
    /// configuration cannot express
    pub fn with_ttl(ttl: Duration, config: IdempotencyConfig) -> Self {
        info!(
            ttl_ms = ttl.as_millis() as u64,
            header_name = %config.header_name,
            "Idempotency store initialized"
        );

        Self {
            records: DashMap::new(),
            ttl,
            config,
        }
    }

    /// Current record for `key`, or `None` if absent or expired
    pub fn check(&self, key: &str) -> Option<IdempotencyRecord> {
        self.purge_expired();
        self.records.get(key).map(|record| record.clone())
    }

    /// Create a `Processing` record for `key`, replacing any previous one
    pub fn start(&self, key: &str) -> IdempotencyRecord {
        self.purge_expired();
        let record = IdempotencyRecord::processing(key, self.ttl);
        if self
            .records
            .insert(key.to_string(), record.clone())
            .is_some()
        {
            warn!(key = key, "Replacing existing idempotency record");
        }
        debug!(key = key, expires_at = %record.expires_at, "Idempotency record started");
        record
    }

    /// Check and start in one step.
    ///
    /// Two racing requests with the same key cannot both get
    /// [`IdempotencyDecision::Proceed`].
    pub fn begin(&self, key: &str) -> IdempotencyDecision {
        self.purge_expired();

        match self.records.entry(key.to_string()) {
            Entry::Occupied(entry) if entry.get().is_replayable() => {
                debug!(key = key, "Replaying cached response");
                IdempotencyDecision::Replay(entry.get().clone())
            }
            Entry::Occupied(_) => {
                debug!(key = key, "Duplicate request while original is in progress");
                IdempotencyDecision::InProgress
            }
            Entry::Vacant(entry) => {
                entry.insert(IdempotencyRecord::processing(key, self.ttl));
                debug!(key = key, "Idempotency record started");
                IdempotencyDecision::Proceed
            }
        }
    }

    /// Cache the response for `key` and mark it completed.
    ///
    /// The original expiry is kept. Returns `false` when no record exists,
    /// for example because it expired while the operation ran.
    pub fn complete(
        &self,
        key: &str,
        status_code: u16,
        body: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> bool {
        self.purge_expired();
        match self.records.get_mut(key) {
            Some(mut record) => {
                record.mark_completed(status_code, body.into(), headers);
                debug!(key = key, status_code = status_code, "Idempotency record completed");
                true
            }
            None => {
                warn!(key = key, "No idempotency record to complete");
                false
            }
        }
    }

    /// Forget `key` so a retried request starts fresh. Returns whether a
    /// record was removed.
    pub fn fail(&self, key: &str) -> bool {
        let removed = self.records.remove(key).is_some();
        debug!(key = key, removed = removed, "Idempotency record discarded after failure");
        removed
    }

    /// Number of live records
    pub fn size(&self) -> usize {
        self.purge_expired();
        self.records.len()
    }

    /// Remove every expired record, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = chrono::Utc::now();
        let mut purged = 0;
        self.records.retain(|_, record| {
            let keep = !record.is_expired_at(now);
            if !keep {
                purged += 1;
            }
            keep
        });

        if purged > 0 {
            debug!(purged = purged, "Purged expired idempotency records");
        }
        purged
    }

    /// Header that carries the key at the HTTP boundary
    pub fn header_name(&self) -> &str {
        &self.config.header_name
    }

    /// Whether requests with this method take part in deduplication
    pub fn applies_to(&self, method: &str) -> bool {
        self.config.applies_to(method)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A new random key for clients that do not supply one
    pub fn generate_key() -> String {
        Uuid::new_v4().to_string()
    }
}

impl Default for IdempotencyStore {
    fn default() -> Self {
        Self::new(IdempotencyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idempotency::IdempotencyStatus;
    use std::sync::Arc;

    #[test]
    fn test_start_complete_check() {
        let store = IdempotencyStore::default();

        store.start("order-1");
        assert_eq!(
            store.check("order-1").unwrap().status,
            IdempotencyStatus::Processing
        );

        let headers = HashMap::from([("content-type".to_string(), "text/plain".to_string())]);
        assert!(store.complete("order-1", 200, "body", headers.clone()));

        let record = store.check("order-1").unwrap();
        assert_eq!(record.status, IdempotencyStatus::Completed);
        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.response_body.as_deref(), Some("body"));
        assert_eq!(record.response_headers, headers);
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn test_fail_removes_record() {
        let store = IdempotencyStore::default();

        store.start("order-2");
        assert!(store.fail("order-2"));
        assert!(store.check("order-2").is_none());
        assert!(!store.fail("order-2"));
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_complete_without_record() {
        let store = IdempotencyStore::default();
        assert!(!store.complete("missing", 201, "", HashMap::new()));
        assert!(store.check("missing").is_none());
    }

    #[test]
    fn test_complete_keeps_original_expiry() {
        let store = IdempotencyStore::default();
        let started = store.start("order-3");
        store.complete("order-3", 200, "ok", HashMap::new());

        assert_eq!(store.check("order-3").unwrap().expires_at, started.expires_at);
    }

    #[test]
    fn test_expired_records_are_purged() {
        let store = IdempotencyStore::with_ttl(Duration::from_millis(30), IdempotencyConfig::default());
        store.start("short-lived");
        assert_eq!(store.size(), 1);

        std::thread::sleep(Duration::from_millis(60));

        assert!(store.check("short-lived").is_none());
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_begin_decisions() {
        let store = IdempotencyStore::default();

        assert_eq!(store.begin("payment-9"), IdempotencyDecision::Proceed);
        assert_eq!(store.begin("payment-9"), IdempotencyDecision::InProgress);

        store.complete("payment-9", 201, "created", HashMap::new());
        match store.begin("payment-9") {
            IdempotencyDecision::Replay(record) => {
                assert_eq!(record.status_code, Some(201));
                assert_eq!(record.response_body.as_deref(), Some("created"));
            }
            other => panic!("expected replay, got {other:?}"),
        }

        store.fail("payment-9");
        assert_eq!(store.begin("payment-9"), IdempotencyDecision::Proceed);
    }

    #[test]
    fn test_racing_begin_admits_exactly_one() {
        let store = Arc::new(IdempotencyStore::default());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.begin("contended"))
            })
            .collect();

        let proceeded = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|decision| *decision == IdempotencyDecision::Proceed)
            .count();

        assert_eq!(proceeded, 1);
    }

    #[test]
    fn test_request_boundary_helpers() {
        let store = IdempotencyStore::default();
        assert_eq!(store.header_name(), "Idempotency-Key");
        assert!(store.applies_to("put"));
        assert!(!store.applies_to("GET"));
        assert_eq!(store.ttl(), Duration::from_secs(86_400));

        let key = IdempotencyStore::generate_key();
        assert!(Uuid::parse_str(&key).is_ok());
        assert_ne!(key, IdempotencyStore::generate_key());
    }
}
