//! Durable retry records
//!
//! A record holds a batch whose in-memory retry budget ran out. Records are
//! written once, replayed against the session they were created under, and
//! deleted after a successful replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::BrowsingEvent;
use super::session::SessionId;
use crate::constants::PENDING_EVENTS_PREFIX;

/// Stored value of a durable retry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPayload {
    pub session_id: SessionId,
    pub events: Vec<BrowsingEvent>,
    /// Milliseconds since the epoch.
    pub created_at: i64,
}

/// A durable retry record together with its storage key.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryRecord {
    pub key: String,
    pub payload: RetryPayload,
}

impl RetryRecord {
    /// Create a record stamped with `created_at`.
    ///
    /// The key embeds the creation time first so that lexical key order is
    /// creation order, followed by a random suffix to keep records created in
    /// the same millisecond apart.
    pub fn new(session_id: SessionId, events: Vec<BrowsingEvent>, created_at: DateTime<Utc>) -> Self {
        let millis = created_at.timestamp_millis();
        let key = format!("{PENDING_EVENTS_PREFIX}{millis:013}-{}", Uuid::new_v4().simple());
        Self { key, payload: RetryPayload { session_id, events, created_at: millis } }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.payload.session_id
    }

    pub fn events(&self) -> &[BrowsingEvent] {
        &self.payload.events
    }

    /// True when `key` lives under the reserved retry prefix.
    pub fn is_retry_key(key: &str) -> bool {
        key.starts_with(PENDING_EVENTS_PREFIX)
    }
}
