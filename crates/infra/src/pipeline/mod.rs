//! Event pipeline runtime
//!
//! [`EventPipeline::spawn`] starts the actor that owns the recording session
//! and its pending queue, and returns a [`PipelineHandle`] to talk to it.

mod actor;
pub mod commands;
pub mod handle;

use std::sync::Arc;
use std::time::Duration;

use mindhit_core::{DeliveryEngine, EventSink, KeyValueStore, StoredCredentials, TabNotifier};
use mindhit_domain::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_EXTENSION_ORIGIN, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_MAX_RETRY,
};
use mindhit_domain::Config;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use self::actor::{ActorParts, PipelineActor};
pub use self::commands::PipelineCommand;
pub use self::handle::PipelineHandle;
use crate::scheduling::FlushScheduler;

/// Tuning for a pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub max_retry: u32,
    pub flush_interval: Duration,
    /// How long shutdown waits for in-flight deliveries and writes
    pub join_timeout: Duration,
    pub allowed_origins: Vec<String>,
    pub command_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retry: DEFAULT_MAX_RETRY,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            join_timeout: Duration::from_secs(10),
            allowed_origins: vec![DEFAULT_EXTENSION_ORIGIN.to_string()],
            command_buffer: 256,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.queue.batch_size,
            max_retry: config.queue.max_retry,
            flush_interval: config.queue.flush_interval(),
            allowed_origins: config.extension.allowed_origins.clone(),
            ..Self::default()
        }
    }
}

/// Collaborators injected into the pipeline
pub struct PipelineDeps {
    pub sink: Arc<dyn EventSink>,
    pub store: Arc<dyn KeyValueStore>,
    pub notifier: Arc<dyn TabNotifier>,
}

pub struct EventPipeline;

impl EventPipeline {
    /// Spawn the pipeline actor on the current runtime.
    ///
    /// A replay sweep of durable records starts immediately. The actor runs
    /// until [`PipelineHandle::shutdown`] is called or every handle is
    /// dropped; the returned join handle completes after that.
    pub fn spawn(deps: PipelineDeps, config: PipelineConfig) -> (PipelineHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

        let actor = PipelineActor::new(ActorParts {
            engine: DeliveryEngine::new(deps.sink, Arc::clone(&deps.store)),
            credentials: StoredCredentials::new(deps.store),
            notifier: deps.notifier,
            scheduler: FlushScheduler::new(config.flush_interval, tx.downgrade()),
            batch_size: config.batch_size,
            max_retry: config.max_retry,
            join_timeout: config.join_timeout,
        });

        let handle = PipelineHandle::new(tx, &config.allowed_origins);
        let join = tokio::spawn(actor.run(rx));
        (handle, join)
    }
}
