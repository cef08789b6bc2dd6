//! Length-prefixed JSON framing for the raw bidirectional streams handed out
//! by `libp2p::stream`.
//!
//! Wire format per message:
//!   [4 bytes big-endian length][UTF-8 JSON payload]
//!
//! A clean EOF while reading the 4-byte length header means the peer closed
//! the stream deliberately; an EOF partway through the header or the payload
//! is a fault and is reported as such so callers can tell the two apart.

use std::io;

use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::P2pError;

/// Maximum payload size accepted on either side of the wire.
pub const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024; // 10 MiB

/// Write `value` as a length-prefixed JSON frame. Completes partial writes
/// internally (`write_all` loops until the whole buffer is sent).
pub async fn write_frame<W, T>(io: &mut W, value: &T) -> Result<(), P2pError>
where
    W: AsyncWrite + Unpin + Send,
    T: serde::Serialize,
{
    let payload = serde_json::to_vec(value)?;
    if payload.len() > MAX_MESSAGE_BYTES {
        return Err(P2pError::Codec(format!(
            "outgoing message of {} bytes exceeds the {} byte limit",
            payload.len(),
            MAX_MESSAGE_BYTES
        )));
    }
    let len = payload.len() as u32;
    io.write_all(&len.to_be_bytes()).await?;
    io.write_all(&payload).await?;
    io.flush().await?;
    Ok(())
}

/// Outcome of reading one frame: either a decoded value, or a clean close
/// signalled by EOF on the length header (no partial frame was in flight).
pub enum Frame<T> {
    Message(T),
    Closed,
}

/// Read one length-prefixed JSON frame.
pub async fn read_frame<R, T>(io: &mut R) -> Result<Frame<T>, P2pError>
where
    R: AsyncRead + Unpin + Send,
    T: for<'de> serde::Deserialize<'de>,
{
    let mut len_buf = [0u8; 4];
    match io.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(Frame::Closed),
        Err(e) => return Err(P2pError::from(e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_MESSAGE_BYTES {
        return Err(P2pError::Codec(format!(
            "invalid frame length {len} (must be in 1..={MAX_MESSAGE_BYTES})"
        )));
    }

    let mut payload = vec![0u8; len];
    io.read_exact(&mut payload).await?;
    let value = serde_json::from_slice(&payload)?;
    Ok(Frame::Message(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_preserves_value() {
        let mut cursor = futures::io::Cursor::new(Vec::new());
        write_frame(&mut cursor, &"hello").await.unwrap();
        let buf = cursor.into_inner();
        assert_eq!(&buf, &[0, 0, 0, 7, b'"', b'h', b'e', b'l', b'l', b'o', b'"']);

        let mut cursor = futures::io::Cursor::new(buf);
        match read_frame::<_, String>(&mut cursor).await.unwrap() {
            Frame::Message(s) => assert_eq!(s, "hello"),
            Frame::Closed => panic!("expected a message"),
        }
    }

    #[tokio::test]
    async fn empty_stream_reads_as_clean_close() {
        let mut cursor = futures::io::Cursor::new(Vec::<u8>::new());
        match read_frame::<_, String>(&mut cursor).await.unwrap() {
            Frame::Message(_) => panic!("expected a clean close"),
            Frame::Closed => {}
        }
    }

    #[tokio::test]
    async fn zero_length_frame_is_rejected() {
        let mut cursor = futures::io::Cursor::new(vec![0u8, 0, 0, 0]);
        let err = read_frame::<_, String>(&mut cursor).await.unwrap_err();
        assert!(matches!(err, P2pError::Codec(_)));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_before_reading_payload() {
        let mut len = ((MAX_MESSAGE_BYTES + 1) as u32).to_be_bytes().to_vec();
        len.extend_from_slice(b"x");
        let mut cursor = futures::io::Cursor::new(len);
        let err = read_frame::<_, String>(&mut cursor).await.unwrap_err();
        assert!(matches!(err, P2pError::Codec(_)));
    }

    #[tokio::test]
    async fn truncated_payload_is_an_io_error_not_a_clean_close() {
        let mut cursor = futures::io::Cursor::new(vec![0u8, 0, 0, 5, b'h', b'i']);
        let err = read_frame::<_, String>(&mut cursor).await.unwrap_err();
        assert!(matches!(err, P2pError::Io(_)));
    }
}
