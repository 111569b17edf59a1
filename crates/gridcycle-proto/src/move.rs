use bytes::{Buf, BufMut, BytesMut};

use crate::ProtocolError;

/// Encodes a move frame payload: a single big-endian `u32` direction code.
#[must_use]
pub fn encode_move(direction: u32) -> BytesMut {
    let mut out = BytesMut::with_capacity(4);
    out.put_u32(direction);
    out
}

/// Decodes a move frame payload. The outer frame length must be exactly 4;
/// the direction value itself is not range-checked here (the caller
/// normalizes it with `Direction::from_wire`).
pub fn decode_move(payload: &[u8]) -> Result<u32, ProtocolError> {
    if payload.len() != 4 {
        return Err(ProtocolError::WrongPayloadLength {
            expected: 4,
            actual: payload.len() as u32,
        });
    }
    let mut payload = payload;
    Ok(payload.get_u32())
}
