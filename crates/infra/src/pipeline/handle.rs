//! Cloneable front door to the pipeline actor

use std::sync::Arc;

use mindhit_domain::{ControlEnvelope, ControlMessage, MessageResponse, MindhitError, Result, TabId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

use super::commands::PipelineCommand;

/// Sends commands to a running pipeline.
///
/// Sender origins are checked here, before anything reaches the actor.
#[derive(Clone)]
pub struct PipelineHandle {
    commands: mpsc::Sender<PipelineCommand>,
    allowed_origins: Arc<[String]>,
}

impl PipelineHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<PipelineCommand>,
        allowed_origins: &[String],
    ) -> Self {
        let allowed_origins = allowed_origins
            .iter()
            .map(|origin| normalize_origin(origin).to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        Self { commands, allowed_origins }
    }

    /// Exact match against the allow-list, ignoring a trailing `/`.
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        let origin = normalize_origin(origin);
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }

    /// Route an inbound envelope to the pipeline.
    ///
    /// Returns `Ok(None)` for messages from origins outside the allow-list;
    /// those are ignored without a reply.
    ///
    /// # Errors
    /// Returns `MindhitError::Internal` if the pipeline has stopped.
    #[instrument(skip(self, envelope), fields(message = envelope.message.name()))]
    pub async fn dispatch(&self, envelope: ControlEnvelope) -> Result<Option<MessageResponse>> {
        if !self.is_allowed_origin(&envelope.sender.origin) {
            debug!(origin = %envelope.sender.origin, "Ignoring message from unauthorized sender");
            return Ok(None);
        }

        self.request(envelope.message, envelope.sender.tab_id).await.map(Some)
    }

    /// Send a trusted control message, bypassing the origin check.
    ///
    /// # Errors
    /// Returns `MindhitError::Internal` if the pipeline has stopped.
    pub async fn send(&self, message: ControlMessage) -> Result<MessageResponse> {
        self.request(message, None).await
    }

    /// Report a connectivity change.
    ///
    /// # Errors
    /// Returns `MindhitError::Internal` if the pipeline has stopped.
    pub async fn set_online(&self, online: bool) -> Result<()> {
        self.commands
            .send(PipelineCommand::Connectivity { online })
            .await
            .map_err(|_| pipeline_stopped())
    }

    /// Ask the pipeline to persist what it holds and stop, waiting until it
    /// has.
    ///
    /// # Errors
    /// Returns `MindhitError::Internal` if the pipeline had already stopped.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        let (done, finished) = oneshot::channel();
        self.commands
            .send(PipelineCommand::Shutdown { done })
            .await
            .map_err(|_| pipeline_stopped())?;
        finished.await.map_err(|_| pipeline_stopped())
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request(
        &self,
        message: ControlMessage,
        tab: Option<TabId>,
    ) -> Result<MessageResponse> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(PipelineCommand::Control { message, tab, reply })
            .await
            .map_err(|_| pipeline_stopped())?;
        response.await.map_err(|_| pipeline_stopped())
    }
}

fn normalize_origin(origin: &str) -> &str {
    origin.trim().trim_end_matches('/')
}

fn pipeline_stopped() -> MindhitError {
    MindhitError::Internal("event pipeline is not running".into())
}
