//! Periodic flush timer for the event pipeline.
//!
//! While running, the scheduler posts a [`PipelineCommand::FlushTick`] to the
//! pipeline every `interval`. Ticks are posted with `try_send`; a tick is
//! skipped when the command channel is full, since the next one follows one
//! interval later. The scheduler only holds a weak sender so that it never
//! keeps the pipeline's command channel open on its own.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::pipeline::PipelineCommand;
use crate::scheduling::error::{join_worker, SchedulerError, SchedulerResult, Worker};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Timer driving periodic flushes while a session is recording
pub struct FlushScheduler {
    interval: Duration,
    commands: mpsc::WeakSender<PipelineCommand>,
    cancellation_token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl FlushScheduler {
    pub fn new(interval: Duration, commands: mpsc::WeakSender<PipelineCommand>) -> Self {
        Self {
            interval,
            commands,
            cancellation_token: CancellationToken::new(),
            task_handle: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking; the first tick fires one full interval from now.
    ///
    /// # Errors
    ///
    /// Returns error if the timer is already running
    #[instrument(skip(self), fields(interval_ms = self.interval.as_millis() as u64))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning(Worker::FlushTimer));
        }

        // Fresh token so the timer can restart after stop
        self.cancellation_token = CancellationToken::new();

        let cancel = self.cancellation_token.clone();
        let commands = self.commands.clone();
        let interval = self.interval;

        self.task_handle = Some(tokio::spawn(async move {
            Self::tick_loop(interval, commands, cancel).await;
        }));

        debug!("Flush timer started");
        Ok(())
    }

    /// Stop the timer and wait for its task to finish.
    ///
    /// # Errors
    ///
    /// Returns error if the timer is not running or its task does not stop
    /// within the join timeout
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(SchedulerError::NotRunning(Worker::FlushTimer));
        };

        self.cancellation_token.cancel();

        join_worker(Worker::FlushTimer, handle, JOIN_TIMEOUT).await?;

        debug!("Flush timer stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    async fn tick_loop(
        interval: Duration,
        commands: mpsc::WeakSender<PipelineCommand>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    trace!("Flush timer cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let Some(sender) = commands.upgrade() else {
                        info!("Pipeline gone, flush timer exiting");
                        break;
                    };
                    match sender.try_send(PipelineCommand::FlushTick) {
                        Ok(()) => trace!("Flush tick posted"),
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!("Command channel full, skipping flush tick");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            info!("Pipeline gone, flush timer exiting");
                            break;
                        }
                    }
                }
            }
        }
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
