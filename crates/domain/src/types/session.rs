//! Recording session types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::impl_domain_tag_conversions;

/// Server-assigned identifier of a recording session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a raw identifier; blank identifiers are rejected.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recording state of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Paused,
}

impl_domain_tag_conversions!(RecordingState {
    Idle => "idle",
    Recording => "recording",
    Paused => "paused",
});

/// Per-session counters shown by the side panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounters {
    pub page_count: u64,
    pub highlight_count: u64,
}

/// Answer to `GET_STATE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub is_recording: bool,
    pub session_id: Option<SessionId>,
}

/// Answer to `GET_STATS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub state: RecordingState,
    pub session_id: Option<SessionId>,
    #[serde(flatten)]
    pub counters: SessionCounters,
    /// Milliseconds since the epoch at which the session started.
    pub started_at: Option<i64>,
    pub pending_events: usize,
    pub deliveries_in_flight: usize,
    pub replay_in_progress: bool,
}
