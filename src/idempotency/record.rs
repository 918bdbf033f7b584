//! Idempotency records and their lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Lifecycle of a keyed request
///
/// Records are created `Processing` and move to `Completed` when the response
/// is cached. Failed operations are removed rather than stored, so `Failed` and
/// `Pending` only appear in records built by callers (for example when
/// rehydrating from an external store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdempotencyStatus::Pending => write!(f, "pending"),
            IdempotencyStatus::Processing => write!(f, "processing"),
            IdempotencyStatus::Completed => write!(f, "completed"),
            IdempotencyStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Cached state for one idempotency key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub status: IdempotencyStatus,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub response_headers: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// A fresh `Processing` record expiring `ttl` from now
    pub fn processing(key: impl Into<String>, ttl: Duration) -> Self {
        let created_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            key: key.into(),
            status: IdempotencyStatus::Processing,
            status_code: None,
            response_body: None,
            response_headers: HashMap::new(),
            created_at,
            completed_at: None,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// A completed record carries a response that duplicates can be given
    pub fn is_replayable(&self) -> bool {
        self.status == IdempotencyStatus::Completed
    }

    pub(crate) fn mark_completed(
        &mut self,
        status_code: u16,
        body: String,
        headers: HashMap<String, String>,
    ) {
        self.status = IdempotencyStatus::Completed;
        self.status_code = Some(status_code);
        self.response_body = Some(body);
        self.response_headers = headers;
        self.completed_at = Some(Utc::now());
    }
}
