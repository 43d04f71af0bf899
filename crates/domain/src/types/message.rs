//! Messages exchanged with the extension
//!
//! Inbound control messages arrive wrapped in a [`ControlEnvelope`] naming
//! the sender; outbound traffic is either a reply to one of those messages
//! or a [`TabNotification`] addressed to a content script.

use serde::{Deserialize, Serialize};

use super::event::BrowsingEvent;
use super::session::{SessionSnapshot, SessionStats};

/// Browser tab identifier as assigned by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Control message understood by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ControlMessage {
    SessionStarted { session_id: String },
    SessionPaused,
    SessionResumed,
    SessionStopped,
    Event { event: BrowsingEvent },
    GetState,
    GetStats,
    IncrementPageCount,
    IncrementHighlightCount,
    TabUpdated {
        tab_id: TabId,
        status: String,
        #[serde(default)]
        url: Option<String>,
    },
    TabRemoved { tab_id: TabId },
    NetworkStatus { online: bool },
    /// Bearer token changed in the extension; `None` signs out.
    AuthUpdated {
        #[serde(default)]
        token: Option<String>,
    },
}

impl ControlMessage {
    /// Wire name of the message, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "SESSION_STARTED",
            Self::SessionPaused => "SESSION_PAUSED",
            Self::SessionResumed => "SESSION_RESUMED",
            Self::SessionStopped => "SESSION_STOPPED",
            Self::Event { .. } => "EVENT",
            Self::GetState => "GET_STATE",
            Self::GetStats => "GET_STATS",
            Self::IncrementPageCount => "INCREMENT_PAGE_COUNT",
            Self::IncrementHighlightCount => "INCREMENT_HIGHLIGHT_COUNT",
            Self::TabUpdated { .. } => "TAB_UPDATED",
            Self::TabRemoved { .. } => "TAB_REMOVED",
            Self::NetworkStatus { .. } => "NETWORK_STATUS",
            Self::AuthUpdated { .. } => "AUTH_UPDATED",
        }
    }
}

/// Identity of the context that sent a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    pub origin: String,
    #[serde(default)]
    pub tab_id: Option<TabId>,
}

/// A control message together with its sender and correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEnvelope {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub sender: MessageSender,
    pub message: ControlMessage,
}

impl ControlEnvelope {
    pub fn new(origin: impl Into<String>, message: ControlMessage) -> Self {
        Self { id: None, sender: MessageSender { origin: origin.into(), tab_id: None }, message }
    }
}

/// Reply to an accepted control message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageResponse {
    State(SessionSnapshot),
    Stats(SessionStats),
    Ack(bool),
}

/// Notification sent to the content script of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TabNotification {
    StartRecording,
    PauseRecording,
    ResumeRecording,
    StopRecording,
    PageLoaded,
}

/// A tab notification addressed to a specific tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundNotification {
    pub tab_id: TabId,
    pub notification: TabNotification,
}
