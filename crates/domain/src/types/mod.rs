//! Domain types and models

pub mod event;
pub mod message;
pub mod retry;
pub mod session;

pub use event::{BrowsingEvent, Click, EventKind, Highlight, PageLeave, PageVisit, Scroll};
pub use message::{
    ControlEnvelope, ControlMessage, MessageResponse, MessageSender, OutboundNotification,
    TabId, TabNotification,
};
pub use retry::{RetryPayload, RetryRecord};
pub use session::{RecordingState, SessionCounters, SessionId, SessionSnapshot, SessionStats};
