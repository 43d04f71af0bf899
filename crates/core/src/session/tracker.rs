//! Session lifecycle state machine
//!
//! ```text
//!   idle --start--> recording --pause--> paused
//!     ^                 |  ^               |
//!     |                 |  +----resume-----+
//!     +------stop-------+------stop--------+
//! ```
//!
//! Any other (state, signal) pair is a no-op and returns `None`.

use mindhit_domain::{
    RecordingState, SessionCounters, SessionId, SessionSnapshot, TabNotification,
};

/// What the flush timer should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Start,
    Stop,
}

/// A state change performed by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Started(SessionId),
    Paused,
    Resumed,
    /// Carries the id of the session that just ended.
    Stopped(SessionId),
}

impl Transition {
    /// Notification broadcast to open tabs for this transition.
    pub fn notification(&self) -> TabNotification {
        match self {
            Self::Started(_) => TabNotification::StartRecording,
            Self::Paused => TabNotification::PauseRecording,
            Self::Resumed => TabNotification::ResumeRecording,
            Self::Stopped(_) => TabNotification::StopRecording,
        }
    }

    pub fn timer_action(&self) -> TimerAction {
        match self {
            Self::Started(_) | Self::Resumed => TimerAction::Start,
            Self::Paused | Self::Stopped(_) => TimerAction::Stop,
        }
    }
}

/// Recording state, active session and its counters.
///
/// Invariant: a session id is present whenever the state is not idle.
#[derive(Debug, Default)]
pub struct SessionTracker {
    state: RecordingState,
    session_id: Option<SessionId>,
    counters: SessionCounters,
    started_at: Option<i64>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    /// Milliseconds since the epoch at which the active session started.
    pub fn started_at(&self) -> Option<i64> {
        self.started_at
    }

    /// Answer for `GET_STATE`.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot { is_recording: self.is_recording(), session_id: self.session_id.clone() }
    }

    /// Begin recording `session_id`; only valid while idle.
    pub fn start(&mut self, session_id: SessionId, now_ms: i64) -> Option<Transition> {
        if self.state != RecordingState::Idle {
            return None;
        }

        self.state = RecordingState::Recording;
        self.session_id = Some(session_id.clone());
        self.counters = SessionCounters::default();
        self.started_at = Some(now_ms);
        Some(Transition::Started(session_id))
    }

    pub fn pause(&mut self) -> Option<Transition> {
        if self.state != RecordingState::Recording {
            return None;
        }
        self.state = RecordingState::Paused;
        Some(Transition::Paused)
    }

    pub fn resume(&mut self) -> Option<Transition> {
        if self.state != RecordingState::Paused {
            return None;
        }
        self.state = RecordingState::Recording;
        Some(Transition::Resumed)
    }

    /// End the active session. Counters stay readable until the next start.
    pub fn stop(&mut self) -> Option<Transition> {
        if self.state == RecordingState::Idle {
            return None;
        }

        self.state = RecordingState::Idle;
        self.started_at = None;
        self.session_id.take().map(Transition::Stopped)
    }

    /// Returns false when idle; the counter is left unchanged.
    pub fn increment_page_count(&mut self) -> bool {
        if self.state == RecordingState::Idle {
            return false;
        }
        self.counters.page_count = self.counters.page_count.saturating_add(1);
        true
    }

    /// Returns false when idle; the counter is left unchanged.
    pub fn increment_highlight_count(&mut self) -> bool {
        if self.state == RecordingState::Idle {
            return false;
        }
        self.counters.highlight_count = self.counters.highlight_count.saturating_add(1);
        true
    }
}
