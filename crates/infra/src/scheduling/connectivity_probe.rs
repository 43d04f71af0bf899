//! Periodic health probe used as a connectivity signal.
//!
//! Polls `GET {base_url}/health` and reports changes to the pipeline. Only
//! changes are reported; the pipeline replays durable records when the API
//! comes back.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::api::EventsApiClient;
use crate::pipeline::PipelineHandle;
use crate::scheduling::error::{join_worker, SchedulerError, SchedulerResult, Worker};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ConnectivityProbe {
    client: Arc<EventsApiClient>,
    pipeline: PipelineHandle,
    interval: Duration,
    cancellation_token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl ConnectivityProbe {
    pub fn new(client: Arc<EventsApiClient>, pipeline: PipelineHandle, interval: Duration) -> Self {
        Self {
            client,
            pipeline,
            interval,
            cancellation_token: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start probing; the first probe runs one interval from now.
    ///
    /// # Errors
    ///
    /// Returns error if the probe is already running
    #[instrument(skip(self), fields(interval_secs = self.interval.as_secs()))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning(Worker::ConnectivityProbe));
        }

        info!("Starting connectivity probe");
        self.cancellation_token = CancellationToken::new();

        let client = Arc::clone(&self.client);
        let pipeline = self.pipeline.clone();
        let interval = self.interval;
        let cancel = self.cancellation_token.clone();

        self.task_handle = Some(tokio::spawn(async move {
            Self::probe_loop(client, pipeline, interval, cancel).await;
        }));

        Ok(())
    }

    /// Stop probing and wait for the task to finish.
    ///
    /// # Errors
    ///
    /// Returns error if the probe is not running or does not stop in time
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(SchedulerError::NotRunning(Worker::ConnectivityProbe));
        };

        info!("Stopping connectivity probe");
        self.cancellation_token.cancel();

        join_worker(Worker::ConnectivityProbe, handle, JOIN_TIMEOUT).await?;

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    async fn probe_loop(
        client: Arc<EventsApiClient>,
        pipeline: PipelineHandle,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut last_reported: Option<bool> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Connectivity probe cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let online = match client.health_check().await {
                        Ok(healthy) => healthy,
                        Err(err) => {
                            debug!(kind = err.label(), "Health probe failed");
                            false
                        }
                    };

                    if last_reported == Some(online) {
                        continue;
                    }

                    if let Err(err) = pipeline.set_online(online).await {
                        warn!(error = %err, "Pipeline gone, connectivity probe exiting");
                        break;
                    }
                    last_reported = Some(online);
                }
            }
        }
    }
}

impl Drop for ConnectivityProbe {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
