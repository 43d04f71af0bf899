//! # MindHit Infrastructure
//!
//! Implementations of the core ports and the runtime that drives them.
//!
//! This crate contains:
//! - SQLite and in-memory key-value stores
//! - The reqwest-based events API client
//! - Configuration loading and tracing setup
//! - The pipeline actor, its flush timer and the connectivity probe
//! - The tab registry used for outbound notifications
//!
//! ## Architecture
//! - Implements traits defined in `mindhit-core`
//! - Contains all "impure" code (I/O, timers, HTTP)

pub mod api;
pub mod config;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod scheduling;
pub mod storage;
pub mod tabs;

// Re-export commonly used items
pub use api::{ApiClientConfig, EventsApiClient};
pub use errors::InfraError;
pub use observability::init_tracing;
pub use pipeline::{EventPipeline, PipelineConfig, PipelineDeps, PipelineHandle};
pub use scheduling::{ConnectivityProbe, FlushScheduler, SchedulerError};
pub use storage::{DbManager, MemoryKeyValueStore, SqliteKeyValueStore};
pub use tabs::TabRegistry;
