//! # MindHit Core
//!
//! Recording, batching and delivery logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Session lifecycle tracking
//! - The pending event queue and collector
//! - The delivery and durable retry engine
//! - Port interfaces (traits) for storage, delivery and tab messaging
//!
//! ## Architecture Principles
//! - Only depends on `mindhit-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod delivery;
pub mod queue;
pub mod session;
pub mod storage;

pub use delivery::ports::{CredentialProvider, EventSink};
pub use delivery::{DeliveryEngine, ReplayReport, StoredCredentials};
pub use queue::{collect, CollectOutcome, EventQueue, FailureOutcome, FlushTrigger};
pub use session::ports::TabNotifier;
pub use session::{broadcast, SessionTracker, TimerAction, Transition};
pub use storage::ports::KeyValueStore;
