//! Pending events, batching and flush triggers

pub mod collector;
pub mod event_queue;

pub use collector::{collect, CollectOutcome};
pub use event_queue::{EventQueue, FailureOutcome, FlushTrigger, PushOutcome};
