//! Length-prefixed packet framing over a byte stream.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::MAX_PACKET_SIZE;
use crate::error::{Error, Result};

/// Read one packet.
///
/// Returns `Ok(None)` on clean EOF, i.e. the stream ended before any byte of
/// a length header was consumed; that is the normal termination condition.
/// Once at least one byte has been read, a short stream is a framing error:
/// the peer is malformed and sync cannot be recovered. A zero length prefix
/// is likewise fatal.
pub async fn read_packet<R>(stream: &mut R) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = stream.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::Framing {
                message: "eof inside packet length".into(),
            });
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Err(Error::Framing {
            message: "zero-length packet".into(),
        });
    }
    if len > MAX_PACKET_SIZE {
        return Err(Error::Framing {
            message: format!("packet length {len} exceeds maximum {MAX_PACKET_SIZE}"),
        });
    }

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Framing {
                message: "eof inside packet body".into(),
            }
        } else {
            Error::Io(e)
        }
    })?;

    Ok(Some(Bytes::from(payload)))
}

/// Write one complete, already-framed packet and flush it.
pub async fn write_packet<W>(stream: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(frame).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_from(data: &[u8]) -> Result<Option<Bytes>> {
        let mut cursor = std::io::Cursor::new(data.to_vec());
        read_packet(&mut cursor).await
    }

    #[tokio::test]
    async fn reads_a_packet() {
        let packet = read_from(&[0, 0, 0, 3, 0xAA, 0xBB, 0xCC]).await.unwrap();
        assert_eq!(packet.unwrap().as_ref(), &[0xAA, 0xBB, 0xCC]);
    }

    #[tokio::test]
    async fn clean_eof_is_none() {
        assert!(read_from(&[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_length_is_fatal() {
        let err = read_from(&[0, 0]).await.unwrap_err();
        assert!(matches!(err, Error::Framing { .. }));
    }

    #[tokio::test]
    async fn truncated_body_is_fatal() {
        let err = read_from(&[0, 0, 0, 5, 1, 2]).await.unwrap_err();
        assert!(matches!(err, Error::Framing { .. }));
    }

    #[tokio::test]
    async fn zero_length_is_fatal() {
        let err = read_from(&[0, 0, 0, 0]).await.unwrap_err();
        assert!(matches!(err, Error::Framing { .. }));
    }

    #[tokio::test]
    async fn oversized_length_is_fatal() {
        let err = read_from(&[0xFF, 0xFF, 0xFF, 0xFF]).await.unwrap_err();
        assert!(matches!(err, Error::Framing { .. }));
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let mut sink = std::io::Cursor::new(Vec::new());
        write_packet(&mut sink, &[0, 0, 0, 2, 7, 8]).await.unwrap();
        let packet = read_from(&sink.into_inner()).await.unwrap().unwrap();
        assert_eq!(packet.as_ref(), &[7, 8]);
    }
}
