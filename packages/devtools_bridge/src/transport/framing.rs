//! Length-prefixed JSON envelopes over a byte stream.
//!
//! Wire format: `[4-byte big-endian length][JSON payload]`
//!
//! Outbound frames carry [`OutboundEnvelope`]s, inbound frames carry
//! [`InboundEnvelope`]s.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{InboundEnvelope, OutboundEnvelope};
use crate::transport::channel::{ChannelTransport, InboundReceiver};

/// Maximum frame size (1 MiB). Larger outbound messages are dropped; a larger
/// inbound frame stops the reader.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame too large: {len} bytes (max {max})", max = MAX_FRAME_SIZE)]
    TooLarge { len: usize },

    #[error("malformed frame: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = serde_json::to_vec(message).map_err(FrameError::Encode)?;
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge { len: bytes.len() });
    }
    let len = (bytes.len() as u32).to_be_bytes();
    writer.write_all(&len).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame.
///
/// Returns `None` if the stream ends cleanly between frames. A
/// [`FrameError::Decode`] leaves the stream positioned at the next frame.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge { len });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    serde_json::from_slice(&buf)
        .map(Some)
        .map_err(FrameError::Decode)
}

/// Pump a byte stream pair into a [`ChannelTransport`] and an inbound
/// receiver. Must be called inside a tokio runtime.
pub fn connect_io<R, W>(mut reader: R, mut writer: W) -> (ChannelTransport, InboundReceiver)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundEnvelope>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<InboundEnvelope>();

    tokio::spawn(async move {
        while let Some(envelope) = out_rx.recv().await {
            match write_frame(&mut writer, &envelope).await {
                Ok(()) => {}
                Err(e @ (FrameError::TooLarge { .. } | FrameError::Encode(_))) => {
                    warn!(kind = ?envelope.content.kind, error = %e, "dropping outbound message");
                }
                Err(e) => {
                    warn!(error = %e, "devtools writer stopped");
                    break;
                }
            }
        }
        debug!("devtools writer finished");
    });

    tokio::spawn(async move {
        loop {
            match read_frame::<_, InboundEnvelope>(&mut reader).await {
                Ok(Some(envelope)) => {
                    if in_tx.send(envelope).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(FrameError::Decode(e)) => {
                    warn!(error = %e, "malformed inbound frame, skipping");
                }
                Err(e) => {
                    warn!(error = %e, "devtools reader stopped");
                    break;
                }
            }
        }
        debug!("devtools reader finished");
    });

    (ChannelTransport::new(out_tx), in_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{IncomingCommand, MessageType, RelayMessage};
    use crate::transport::Transport;

    #[tokio::test]
    async fn frame_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let env = InboundEnvelope::emit(&IncomingCommand::Update).unwrap();
        write_frame(&mut a, &env).await.unwrap();
        let back: InboundEnvelope = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(back, env);

        drop(a);
        assert!(read_frame::<_, InboundEnvelope>(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let header = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes();
        let mut reader: &[u8] = &header;
        let err = read_frame::<_, InboundEnvelope>(&mut reader).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn oversized_outbound_message_is_dropped_alone() {
        let (local, mut remote) = tokio::io::duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(local);
        let (transport, _inbound) = connect_io(read_half, write_half);

        let mut huge = RelayMessage::new(MessageType::State);
        huge.payload = Some("x".repeat(MAX_FRAME_SIZE + 10));
        transport.post(huge.into());
        transport.post(RelayMessage::new(MessageType::Action).into());

        let next = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            read_frame::<_, OutboundEnvelope>(&mut remote),
        )
        .await
        .unwrap()
        .unwrap()
        .unwrap();
        assert_eq!(next.content.kind, MessageType::Action);
    }

    #[tokio::test]
    async fn pumps_carry_both_directions_and_skip_garbage() {
        let (local, mut remote) = tokio::io::duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(local);
        let (transport, mut inbound) = connect_io(read_half, write_half);

        transport.post(RelayMessage::new(MessageType::State).into());
        let out: OutboundEnvelope = read_frame(&mut remote).await.unwrap().unwrap();
        assert!(out.is_native_message);
        assert_eq!(out.content.kind, MessageType::State);

        let garbage = b"not json";
        remote
            .write_all(&(garbage.len() as u32).to_be_bytes())
            .await
            .unwrap();
        remote.write_all(garbage).await.unwrap();
        let env = InboundEnvelope::emit(&IncomingCommand::Update).unwrap();
        write_frame(&mut remote, &env).await.unwrap();

        let received = inbound.recv().await.unwrap();
        assert_eq!(received, env);
    }
}
