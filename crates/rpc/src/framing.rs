//! Length-prefixed CBOR frames: a big-endian `u32` length followed by the body.

use crate::error::{Error, Result};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame body accepted (10MB).
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Writes `value` as one frame.
///
/// # Errors
///
/// Returns an error if encoding fails, the frame is too large, or the write fails.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
    T: Serialize + Sync,
{
    let mut encoded = Vec::new();
    ciborium::ser::into_writer(value, &mut encoded).map_err(|e| Error::Encode(e.to_string()))?;

    let length = encoded.len();
    if length > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge(length, MAX_FRAME_SIZE));
    }
    let length_u32: u32 = length
        .try_into()
        .map_err(|_| Error::FrameTooLarge(length, MAX_FRAME_SIZE))?;

    writer
        .write_all(&length_u32.to_be_bytes())
        .await
        .map_err(|e| Error::Io("failed to write length", e))?;
    writer
        .write_all(&encoded)
        .await
        .map_err(|e| Error::Io("failed to write body", e))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Io("failed to flush frame", e))?;

    Ok(())
}

/// Reads one frame. Returns `None` on a clean end of stream before a new frame.
///
/// # Errors
///
/// Returns an error if the read fails, the frame is too large, or decoding fails.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin + Send,
    T: DeserializeOwned,
{
    let length = match reader.read_u32().await {
        Ok(length) => length as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(Error::Io("failed to read length", e)),
    };

    if length > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge(length, MAX_FRAME_SIZE));
    }

    let mut buffer = vec![0u8; length];
    reader
        .read_exact(&mut buffer)
        .await
        .map_err(|e| Error::Io("failed to read body from stream", e))?;

    let value = ciborium::de::from_reader(&buffer[..]).map_err(|e| Error::Decode(e.to_string()))?;

    Ok(Some(value))
}
