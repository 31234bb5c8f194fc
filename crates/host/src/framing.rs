//! Chrome native messaging framing.
//!
//! Each frame is a 4-byte little-endian length header followed by a
//! UTF-8 JSON payload. stdout carries frames only; logging goes to
//! stderr.

use sheetbridge_protocol::{MAX_INBOUND_MESSAGE, MAX_OUTBOUND_MESSAGE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, PartialEq)]
pub enum FramingError {
    /// Stream ended partway through a frame
    UnexpectedEof,
    /// Header announced a zero-length payload
    EmptyFrame,
    /// Frame exceeds the protocol limit
    TooLarge { size: usize, limit: usize },
    Io(String),
}

impl std::fmt::Display for FramingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramingError::UnexpectedEof => write!(f, "stream closed mid-frame"),
            FramingError::EmptyFrame => write!(f, "frame length cannot be zero"),
            FramingError::TooLarge { size, limit } => {
                write!(f, "frame of {} bytes exceeds {} byte limit", size, limit)
            }
            FramingError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for FramingError {}

/// Read one frame.
///
/// `Ok(None)` means the stream closed cleanly between frames, which is
/// how Chrome signals the extension disconnected. EOF inside a frame is
/// an error.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, FramingError> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader
            .read(&mut header[filled..])
            .await
            .map_err(|e| FramingError::Io(e.to_string()))?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FramingError::UnexpectedEof);
        }
        filled += n;
    }

    let length = u32::from_le_bytes(header) as usize;
    if length == 0 {
        return Err(FramingError::EmptyFrame);
    }
    if length > MAX_INBOUND_MESSAGE {
        return Err(FramingError::TooLarge {
            size: length,
            limit: MAX_INBOUND_MESSAGE,
        });
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FramingError::UnexpectedEof
        } else {
            FramingError::Io(e.to_string())
        }
    })?;

    Ok(Some(payload))
}

/// Write one frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), FramingError> {
    if payload.len() > MAX_OUTBOUND_MESSAGE {
        return Err(FramingError::TooLarge {
            size: payload.len(),
            limit: MAX_OUTBOUND_MESSAGE,
        });
    }

    let header = (payload.len() as u32).to_le_bytes();
    writer
        .write_all(&header)
        .await
        .map_err(|e| FramingError::Io(e.to_string()))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| FramingError::Io(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| FramingError::Io(e.to_string()))?;

    Ok(())
}
