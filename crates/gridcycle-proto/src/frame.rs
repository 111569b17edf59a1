use bytes::{Buf, BufMut, BytesMut};

use crate::{MAX_PACKET, ProtocolError};

/// Buffers bytes read off a socket and splits complete `[u32 len][payload]`
/// frames off the front as they arrive.
///
/// Mirrors the accumulate-then-split-front shape of a length-prefixed packet
/// decoder: bytes are appended with [`FrameDecoder::fill`] as they arrive
/// from the socket, and [`FrameDecoder::try_next_frame`] is called in a loop
/// until it returns `Ok(None)` (not enough bytes yet).
#[derive(Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly-read socket bytes to the internal buffer.
    pub fn fill(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Pulls one complete frame's payload off the front of the buffer, if
    /// one has fully arrived.
    ///
    /// Returns `Ok(None)` when fewer than a full frame's bytes are
    /// buffered; that is not an error, it means "try again after the next
    /// read". Returns `Err` only for a malformed length prefix (zero, or
    /// over [`MAX_PACKET`]) — those indicate a broken or hostile peer and
    /// the connection should be dropped.
    pub fn try_next_frame(&mut self) -> Result<Option<BytesMut>, ProtocolError> {
        if self.buf.len() < 4 {
            return Ok(None);
        }

        let len = u32::from_be_bytes(self.buf[..4].try_into().expect("checked above"));

        if len == 0 {
            return Err(ProtocolError::ZeroLengthFrame);
        }
        if len > MAX_PACKET {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: MAX_PACKET,
            });
        }

        let total = 4 + len as usize;
        if self.buf.len() < total {
            return Ok(None);
        }

        self.buf.advance(4);
        Ok(Some(self.buf.split_to(len as usize)))
    }
}

/// Wraps `payload` in the outer `[u32 len][payload]` frame.
#[must_use]
pub fn encode_frame(payload: &[u8]) -> BytesMut {
    let mut out = BytesMut::with_capacity(4 + payload.len());
    out.put_u32(payload.len() as u32);
    out.put_slice(payload);
    out
}
