//! Native-messaging framing
//!
//! Every message is a 4-byte length in native byte order followed by that
//! many bytes of UTF-8 JSON. The browser refuses host messages over 1 MiB.

use mindhit_domain::{MessageResponse, OutboundNotification};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest message the browser accepts from the host.
pub const MAX_OUTBOUND_FRAME: usize = 1024 * 1024;

/// Largest message the host accepts from the browser.
pub const MAX_INBOUND_FRAME: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error on the message channel: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A message written to the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostMessage {
    /// Answer to an inbound request, correlated by its `id`.
    Reply {
        id: Option<serde_json::Value>,
        response: MessageResponse,
    },
    Notification(OutboundNotification),
}

/// Read one frame.
///
/// Returns `Ok(None)` when the stream ends, including in the middle of a
/// length prefix.
///
/// # Errors
/// `FrameTooLarge` for an oversized length prefix, `Io` for a truncated body
/// or a read failure.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let len = u32::from_ne_bytes(prefix) as usize;
    if len > MAX_INBOUND_FRAME {
        return Err(ProtocolError::FrameTooLarge { len, max: MAX_INBOUND_FRAME });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Encode `message` and write it as one frame, flushing afterwards.
///
/// # Errors
/// `Encode` if serialization fails, `FrameTooLarge` past
/// [`MAX_OUTBOUND_FRAME`], `Io` on write failure.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_OUTBOUND_FRAME {
        return Err(ProtocolError::FrameTooLarge { len: body.len(), max: MAX_OUTBOUND_FRAME });
    }

    let len = u32::try_from(body.len())
        .map_err(|_| ProtocolError::FrameTooLarge { len: body.len(), max: MAX_OUTBOUND_FRAME })?;

    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
