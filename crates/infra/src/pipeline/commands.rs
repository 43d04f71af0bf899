//! Messages exchanged between the pipeline actor and its collaborators

use mindhit_core::{FlushTrigger, ReplayReport};
use mindhit_domain::{
    BrowsingEvent, ControlMessage, DeliveryError, MessageResponse, Result, SessionId, TabId,
};
use tokio::sync::oneshot;

/// Input of the pipeline actor.
#[derive(Debug)]
pub enum PipelineCommand {
    /// A validated control message and the channel its answer goes to.
    Control {
        message: ControlMessage,
        tab: Option<TabId>,
        reply: oneshot::Sender<MessageResponse>,
    },
    /// Periodic flush from the scheduler.
    FlushTick,
    /// Connectivity signal from the host or the health probe.
    Connectivity { online: bool },
    /// Flush, persist and stop; `done` fires once nothing is left in flight.
    Shutdown { done: oneshot::Sender<()> },
}

/// Kind of a background task spawned by the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskKind {
    /// Batch taken from the live queue
    LiveDelivery,
    /// Final flush of a stopping session or of shutdown
    FinalDelivery,
    Persist,
    Replay,
}

/// Result of a background task spawned by the actor.
#[derive(Debug)]
pub(crate) enum TaskOutcome {
    Delivered {
        session_id: SessionId,
        batch: Vec<BrowsingEvent>,
        trigger: FlushTrigger,
        result: std::result::Result<(), DeliveryError>,
    },
    Persisted {
        session_id: SessionId,
        batch: Vec<BrowsingEvent>,
        result: Result<String>,
    },
    Replayed(Result<ReplayReport>),
}
