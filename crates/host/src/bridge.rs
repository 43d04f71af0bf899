//! Message pump between the extension and the pipeline
//!
//! One task reads framed envelopes and dispatches them in arrival order; one
//! task owns the output stream and writes both replies and tab notifications.

use mindhit_domain::{ControlEnvelope, OutboundNotification};
use mindhit_infra::PipelineHandle;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::protocol::{read_frame, write_frame, HostMessage, ProtocolError};

/// Why [`read_loop`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// The extension closed its end of the channel
    Eof,
    /// The pipeline stopped accepting messages
    PipelineStopped,
    /// The reply writer went away
    WriterClosed,
}

/// Read envelopes until the stream ends and dispatch each one.
///
/// Frames that are not valid envelopes are logged and skipped. Accepted
/// messages are answered through `replies`; messages from unknown origins get
/// no answer.
///
/// # Errors
/// Returns the framing error when the stream cannot be resynchronised.
pub async fn read_loop<R>(
    mut reader: R,
    pipeline: PipelineHandle,
    replies: mpsc::Sender<HostMessage>,
) -> Result<ReadEnd, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    while let Some(frame) = read_frame(&mut reader).await? {
        let envelope: ControlEnvelope = match serde_json::from_slice(&frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(error = %err, len = frame.len(), "Ignoring unparsable message");
                continue;
            }
        };

        let id = envelope.id.clone();
        let response = match pipeline.dispatch(envelope).await {
            Ok(Some(response)) => response,
            Ok(None) => continue,
            Err(err) => {
                warn!(error = %err, "Pipeline rejected message");
                return Ok(ReadEnd::PipelineStopped);
            }
        };

        if replies.send(HostMessage::Reply { id, response }).await.is_err() {
            return Ok(ReadEnd::WriterClosed);
        }
    }

    info!("Extension closed the message channel");
    Ok(ReadEnd::Eof)
}

/// Spawn the task that owns the output stream.
///
/// It runs until both channels are closed or a write fails.
pub fn spawn_writer<W>(
    mut writer: W,
    mut replies: mpsc::Receiver<HostMessage>,
    mut notifications: mpsc::Receiver<OutboundNotification>,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut replies_open = true;
        let mut notifications_open = true;

        while replies_open || notifications_open {
            let message = tokio::select! {
                reply = replies.recv(), if replies_open => match reply {
                    Some(reply) => reply,
                    None => {
                        replies_open = false;
                        continue;
                    }
                },
                notification = notifications.recv(), if notifications_open => match notification {
                    Some(notification) => HostMessage::Notification(notification),
                    None => {
                        notifications_open = false;
                        continue;
                    }
                },
            };

            match write_frame(&mut writer, &message).await {
                Ok(()) => trace!("Message written"),
                Err(ProtocolError::FrameTooLarge { len, max }) => {
                    warn!(len, max, "Dropping outbound message over the size limit");
                }
                Err(err) => {
                    error!(error = %err, "Failed to write to the extension, writer exiting");
                    break;
                }
            }
        }

        debug!("Writer stopped");
    })
}
