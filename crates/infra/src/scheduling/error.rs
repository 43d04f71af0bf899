//! Lifecycle errors of the pipeline's background loops

use std::fmt;
use std::time::Duration;

use mindhit_domain::MindhitError;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

/// Which background loop an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Worker {
    FlushTimer,
    ConnectivityProbe,
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FlushTimer => "flush timer",
            Self::ConnectivityProbe => "connectivity probe",
        })
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("{0} is already running")]
    AlreadyRunning(Worker),

    #[error("{0} is not running")]
    NotRunning(Worker),

    #[error("{worker} did not stop within {}s", .waited.as_secs())]
    StopTimedOut { worker: Worker, waited: Duration },

    #[error("{worker} task failed")]
    Crashed {
        worker: Worker,
        #[source]
        source: JoinError,
    },
}

impl SchedulerError {
    pub fn worker(&self) -> Worker {
        match self {
            Self::AlreadyRunning(worker) | Self::NotRunning(worker) => *worker,
            Self::StopTimedOut { worker, .. } | Self::Crashed { worker, .. } => *worker,
        }
    }
}

/// Lifecycle misuse is the caller's mistake; a loop that hangs or panics is ours.
impl From<SchedulerError> for MindhitError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning(_) | SchedulerError::NotRunning(_) => {
                MindhitError::InvalidInput(err.to_string())
            }
            SchedulerError::StopTimedOut { .. } => MindhitError::Internal(err.to_string()),
            SchedulerError::Crashed { worker, source } => {
                MindhitError::Internal(format!("{worker} task failed: {source}"))
            }
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Wait up to `limit` for a cancelled loop to wind down.
pub(crate) async fn join_worker(
    worker: Worker,
    handle: JoinHandle<()>,
    limit: Duration,
) -> SchedulerResult<()> {
    tokio::time::timeout(limit, handle)
        .await
        .map_err(|_| SchedulerError::StopTimedOut { worker, waited: limit })?
        .map_err(|source| SchedulerError::Crashed { worker, source })
}
