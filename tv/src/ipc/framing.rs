//! Native messaging framing: 4-byte little-endian length, then UTF-8 JSON

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame the browser accepts from a host
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Largest frame a browser sends to a host
pub const MAX_INBOUND_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Errors on the browser stdio pipe
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame of {frame_bytes} bytes exceeds {max_bytes}")]
    FrameTooLarge { frame_bytes: usize, max_bytes: usize },

    #[error("Coordinator stopped")]
    CoordinatorGone,
}

/// Read one frame; `Ok(None)` when the browser closed the pipe
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, BridgeError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    read_frame_within(reader, MAX_INBOUND_FRAME_BYTES).await
}

/// Read one frame of at most `max_bytes`
///
/// An oversized frame's payload is consumed before `FrameTooLarge` is
/// returned, so the stream stays aligned on the next frame.
pub async fn read_frame_within<R, T>(reader: &mut R, max_bytes: usize) -> Result<Option<T>, BridgeError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0_u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let frame_bytes = u32::from_le_bytes(header) as usize;
    if frame_bytes > max_bytes {
        let skipped = tokio::io::copy(&mut (&mut *reader).take(frame_bytes as u64), &mut tokio::io::sink()).await?;
        if skipped < frame_bytes as u64 {
            return Ok(None);
        }
        return Err(BridgeError::FrameTooLarge { frame_bytes, max_bytes });
    }

    let mut payload = vec![0_u8; frame_bytes];
    reader.read_exact(&mut payload).await?;
    Ok(Some(serde_json::from_slice(&payload)?))
}

/// Write one frame and flush
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(BridgeError::FrameTooLarge {
            frame_bytes: payload.len(),
            max_bytes: MAX_FRAME_BYTES,
        });
    }

    let len = u32::try_from(payload.len()).map_err(|_| BridgeError::FrameTooLarge {
        frame_bytes: payload.len(),
        max_bytes: MAX_FRAME_BYTES,
    })?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn test_frame_layout() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &json!({"a": 1})).await.unwrap();

        let body = br#"{"a":1}"#;
        assert_eq!(&buf[..4], &(body.len() as u32).to_le_bytes());
        assert_eq!(&buf[4..], body);

        let mut reader = buf.as_slice();
        let back: Option<Value> = read_frame(&mut reader).await.unwrap();
        assert_eq!(back, Some(json!({"a": 1})));

        let eof: Option<Value> = read_frame(&mut reader).await.unwrap();
        assert_eq!(eof, None);
    }

    #[tokio::test]
    async fn test_oversized_frame_skipped_and_stream_stays_aligned() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &json!({"blob": "x".repeat(64)})).await.unwrap();
        write_frame(&mut buf, &json!({"a": 1})).await.unwrap();

        let mut reader = buf.as_slice();
        let result: Result<Option<Value>, _> = read_frame_within(&mut reader, 32).await;
        assert!(matches!(
            result,
            Err(BridgeError::FrameTooLarge { max_bytes: 32, .. })
        ));

        let next: Option<Value> = read_frame_within(&mut reader, 32).await.unwrap();
        assert_eq!(next, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_truncated_oversized_frame_is_eof() {
        let header = ((MAX_INBOUND_FRAME_BYTES + 1) as u32).to_le_bytes();
        let mut reader = &header[..];
        let result: Option<Value> = read_frame(&mut reader).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_inbound_frames_may_exceed_outbound_cap() {
        let big = "x".repeat(MAX_FRAME_BYTES + 1024);
        let payload = serde_json::to_vec(&json!({ "blob": big })).unwrap();
        let mut buf = (payload.len() as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(&payload);

        let mut reader = buf.as_slice();
        let back: Option<Value> = read_frame(&mut reader).await.unwrap();
        assert_eq!(back.unwrap()["blob"].as_str().map(str::len), Some(MAX_FRAME_BYTES + 1024));
    }

    #[tokio::test]
    async fn test_oversized_payload_not_written() {
        let big = "x".repeat(MAX_FRAME_BYTES);
        let mut buf = Vec::new();
        let result = write_frame(&mut buf, &json!({ "blob": big })).await;
        assert!(matches!(result, Err(BridgeError::FrameTooLarge { .. })));
        assert!(buf.is_empty());
    }
}
