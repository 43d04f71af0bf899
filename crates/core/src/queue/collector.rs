//! Event collector
//!
//! Events are accepted only while recording. Events that arrive while paused
//! are dropped, the same as while idle.

use mindhit_domain::{BrowsingEvent, MindhitError, RecordingState};
use tracing::{debug, warn};

use super::event_queue::{EventQueue, PushOutcome};

/// Result of offering an event to the collector.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectOutcome {
    /// Appended; `pending` is the new queue length
    Queued { pending: usize },
    /// Appended and the batch size was reached; flush now
    FlushRequested { pending: usize },
    /// Not recording
    Dropped(RecordingState),
    /// Failed validation
    Rejected(MindhitError),
}

/// Offer `event` to `queue` given the current recording `state`.
pub fn collect(state: RecordingState, queue: &mut EventQueue, event: BrowsingEvent) -> CollectOutcome {
    if state != RecordingState::Recording {
        debug!(%state, kind = %event.kind(), "Dropping event received while not recording");
        return CollectOutcome::Dropped(state);
    }

    let event = event.normalized();
    if let Err(err) = event.validate() {
        warn!(error = %err, "Dropping invalid event");
        return CollectOutcome::Rejected(err);
    }

    match queue.push(event) {
        PushOutcome::Queued => CollectOutcome::Queued { pending: queue.len() },
        PushOutcome::ThresholdReached => CollectOutcome::FlushRequested { pending: queue.len() },
    }
}
