//! FLAP: the outer length-delimited envelope layer.
//!
//! Every byte on an OSCAR connection travels inside a FLAP frame:
//!
//! ```text
//! FlapFrame {
//!     start:    u8,   // always 0x2A
//!     type:     u8,   // Signon=1 Data=2 Error=3 Signoff=4 KeepAlive=5
//!     sequence: u16,  // monotonic per direction, wraps mod 2^16
//!     length:   u16,  // payload byte count
//!     payload:  [u8; length],
//! }
//! ```
//!
//! [`FlapWriter`] owns the outbound sequence counter for one connection and
//! bumps it only after a frame has been fully written, so the wire sequence
//! is gapless even when a write fails partway and the connection is torn
//! down.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Result, WireError};

/// FLAP start-of-frame marker.
pub const FLAP_START_MARKER: u8 = 0x2A;

/// FLAP frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Connection handshake frame.
    Signon = 1,
    /// SNAC-bearing data frame.
    Data = 2,
    /// FLAP-level error.
    Error = 3,
    /// Orderly close.
    Signoff = 4,
    /// Client liveness ping; carries no payload of interest.
    KeepAlive = 5,
}

impl TryFrom<u8> for FrameType {
    type Error = WireError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            1 => Ok(Self::Signon),
            2 => Ok(Self::Data),
            3 => Ok(Self::Error),
            4 => Ok(Self::Signoff),
            5 => Ok(Self::KeepAlive),
            other => Err(WireError::UnknownFrameType(other)),
        }
    }
}

/// One decoded FLAP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlapFrame {
    /// Frame type.
    pub frame_type: FrameType,
    /// Sequence number as sent by the peer.
    pub sequence: u16,
    /// Payload bytes, exactly as framed.
    pub payload: Vec<u8>,
}

/// Reads FLAP frames off a byte stream.
#[derive(Debug)]
pub struct FlapReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FlapReader<R> {
    /// Wrap a readable stream.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Block-read one frame: the 6-byte header, then exactly `length`
    /// payload bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::BadStartMarker`] on a corrupt stream (connection-fatal),
    /// [`WireError::Io`] on EOF or a short read.
    pub async fn read_frame(&mut self) -> Result<FlapFrame> {
        let mut header = [0u8; 6];
        self.inner.read_exact(&mut header).await?;

        if header[0] != FLAP_START_MARKER {
            return Err(WireError::BadStartMarker(header[0]));
        }
        let frame_type = FrameType::try_from(header[1])?;
        let sequence = u16::from_be_bytes([header[2], header[3]]);
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;

        let mut payload = vec![0u8; length];
        self.inner.read_exact(&mut payload).await?;

        Ok(FlapFrame {
            frame_type,
            sequence,
            payload,
        })
    }
}

/// Writes FLAP frames onto a byte stream, numbering them.
#[derive(Debug)]
pub struct FlapWriter<W> {
    inner: W,
    sequence: u16,
}

impl<W: AsyncWrite + Unpin> FlapWriter<W> {
    /// Wrap a writable stream. `start_sequence` seeds the outbound counter
    /// (the auth service starts at 100).
    pub fn new(inner: W, start_sequence: u16) -> Self {
        Self {
            inner,
            sequence: start_sequence,
        }
    }

    /// The sequence number the next frame will carry.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Write one frame: header then payload, flushed as a single logical
    /// message. The sequence counter advances only after the full frame is
    /// on the stream.
    pub async fn write_frame(&mut self, frame_type: FrameType, payload: &[u8]) -> Result<()> {
        let length =
            u16::try_from(payload.len()).map_err(|_| WireError::PayloadTooLarge(payload.len()))?;

        let mut buf = Vec::with_capacity(6 + payload.len());
        buf.push(FLAP_START_MARKER);
        buf.push(frame_type as u8);
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&length.to_be_bytes());
        buf.extend_from_slice(payload);

        self.inner.write_all(&buf).await?;
        self.inner.flush().await?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }

    /// Write a `Signon` frame.
    pub async fn write_signon(&mut self, payload: &[u8]) -> Result<()> {
        self.write_frame(FrameType::Signon, payload).await
    }

    /// Write a `Data` frame.
    pub async fn write_data(&mut self, payload: &[u8]) -> Result<()> {
        self.write_frame(FrameType::Data, payload).await
    }

    /// Write an empty `Signoff` frame.
    pub async fn write_signoff(&mut self) -> Result<()> {
        self.write_frame(FrameType::Signoff, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flap_roundtrip() {
        let mut out = Vec::new();
        {
            let mut w = FlapWriter::new(&mut out, 100);
            w.write_data(b"hello").await.expect("write");
        }

        let mut r = FlapReader::new(out.as_slice());
        let frame = r.read_frame().await.expect("read");
        assert_eq!(frame.frame_type, FrameType::Data);
        assert_eq!(frame.sequence, 100);
        assert_eq!(frame.payload, b"hello");
    }

    #[tokio::test]
    async fn test_sequence_monotonic() {
        let mut out = Vec::new();
        {
            let mut w = FlapWriter::new(&mut out, 0xFFFE);
            w.write_data(b"a").await.expect("write");
            w.write_data(b"b").await.expect("write");
            w.write_data(b"c").await.expect("write");
        }

        let mut r = FlapReader::new(out.as_slice());
        let seqs = [
            r.read_frame().await.expect("f1").sequence,
            r.read_frame().await.expect("f2").sequence,
            r.read_frame().await.expect("f3").sequence,
        ];
        // Wraps mod 2^16.
        assert_eq!(seqs, [0xFFFE, 0xFFFF, 0x0000]);
    }

    #[tokio::test]
    async fn test_bad_start_marker_rejected() {
        let raw = [0x2B, 0x02, 0x00, 0x00, 0x00, 0x00];
        let mut r = FlapReader::new(raw.as_slice());
        assert!(matches!(
            r.read_frame().await,
            Err(WireError::BadStartMarker(0x2B))
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_io_error() {
        // Header promises 10 bytes, stream has 2.
        let raw = [0x2A, 0x02, 0x00, 0x01, 0x00, 0x0A, 0xAA, 0xBB];
        let mut r = FlapReader::new(raw.as_slice());
        assert!(matches!(r.read_frame().await, Err(WireError::Io(_))));
    }

    #[tokio::test]
    async fn test_signoff_has_empty_payload() {
        let mut out = Vec::new();
        {
            let mut w = FlapWriter::new(&mut out, 1);
            w.write_signoff().await.expect("write");
        }
        let mut r = FlapReader::new(out.as_slice());
        let frame = r.read_frame().await.expect("read");
        assert_eq!(frame.frame_type, FrameType::Signoff);
        assert!(frame.payload.is_empty());
    }
}
