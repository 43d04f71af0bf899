//! Host context - dependency wiring for the native-messaging host

use std::sync::Arc;
use std::time::Duration;

use mindhit_core::{KeyValueStore, StoredCredentials};
use mindhit_domain::{Config, MindhitError, OutboundNotification, Result, StorageConfig};
use mindhit_infra::{
    ApiClientConfig, ConnectivityProbe, DbManager, EventPipeline, EventsApiClient,
    MemoryKeyValueStore, PipelineConfig, PipelineDeps, PipelineHandle, SqliteKeyValueStore,
    TabRegistry,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Grace period on top of the pipeline's own join timeout
const SHUTDOWN_SLACK: Duration = Duration::from_secs(5);

/// Holds every long-lived service of the host
pub struct HostContext {
    pub config: Config,
    pub db: Option<Arc<DbManager>>,
    pub store: Arc<dyn KeyValueStore>,
    pub client: Arc<EventsApiClient>,
    pub tabs: Arc<TabRegistry>,
    pub pipeline: PipelineHandle,
    pipeline_task: JoinHandle<()>,
    pipeline_join_timeout: Duration,
    probe: Option<ConnectivityProbe>,
}

impl HostContext {
    /// Build the context and start the pipeline.
    ///
    /// Tab notifications are queued on `outbound`. Must be called inside a
    /// Tokio runtime.
    ///
    /// # Errors
    /// Fails if the database cannot be opened or migrated, or the HTTP client
    /// cannot be built.
    pub fn new(config: Config, outbound: mpsc::Sender<OutboundNotification>) -> Result<Self> {
        let (db, store) = open_store(&config.storage)?;

        let credentials = Arc::new(StoredCredentials::new(Arc::clone(&store)));
        let client =
            Arc::new(EventsApiClient::new(ApiClientConfig::from(&config.api), credentials)?);
        let tabs = Arc::new(TabRegistry::new(outbound));

        let pipeline_config = PipelineConfig::from_config(&config);
        let pipeline_join_timeout = pipeline_config.join_timeout;
        let (pipeline, pipeline_task) = EventPipeline::spawn(
            PipelineDeps {
                sink: client.clone(),
                store: Arc::clone(&store),
                notifier: tabs.clone(),
            },
            pipeline_config,
        );

        let probe = if config.connectivity.probe_enabled {
            let mut probe = ConnectivityProbe::new(
                Arc::clone(&client),
                pipeline.clone(),
                config.connectivity.probe_interval(),
            );
            probe.start().map_err(MindhitError::from)?;
            Some(probe)
        } else {
            None
        };

        info!(
            api = %config.api.base_url,
            durable = db.is_some(),
            probe = probe.is_some(),
            "Host context ready"
        );

        Ok(Self {
            config,
            db,
            store,
            client,
            tabs,
            pipeline,
            pipeline_task,
            pipeline_join_timeout,
            probe,
        })
    }

    pub fn probe_running(&self) -> bool {
        self.probe.as_ref().is_some_and(ConnectivityProbe::is_running)
    }

    /// Stop the probe, then let the pipeline persist what it holds and exit.
    ///
    /// # Errors
    /// Returns `MindhitError::Internal` if the pipeline task does not finish
    /// in time or panicked.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down host context");

        if let Some(mut probe) = self.probe.take() {
            if let Err(err) = probe.stop().await {
                warn!(error = %err, "Connectivity probe did not stop cleanly");
            }
        }

        if let Err(err) = self.pipeline.shutdown().await {
            // Already gone; the join below reports how it ended
            warn!(error = %err, "Pipeline did not acknowledge shutdown");
        }

        let limit = self.pipeline_join_timeout + SHUTDOWN_SLACK;
        tokio::time::timeout(limit, self.pipeline_task)
            .await
            .map_err(|_| {
                MindhitError::Internal(format!(
                    "pipeline did not stop within {}s",
                    limit.as_secs()
                ))
            })?
            .map_err(|e| MindhitError::Internal(format!("pipeline task failed: {e}")))?;

        info!("Host context shut down");
        Ok(())
    }
}

/// Open the configured durable store.
///
/// Without a path everything stays in memory and is lost on exit.
fn open_store(
    config: &StorageConfig,
) -> Result<(Option<Arc<DbManager>>, Arc<dyn KeyValueStore>)> {
    let Some(path) = config.path.as_deref() else {
        warn!("No storage path configured, durable records will not survive a restart");
        return Ok((None, Arc::new(MemoryKeyValueStore::new())));
    };

    let db = Arc::new(DbManager::new(path, config.pool_size)?);
    db.run_migrations()?;
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(Arc::clone(&db)));
    Ok((Some(db), store))
}
