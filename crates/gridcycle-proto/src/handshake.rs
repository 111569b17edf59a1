use bytes::{Buf, BufMut, BytesMut};

use crate::{Color, MAX_PAYLOAD, MAX_STRING, ProtocolError};

/// Encodes a handshake name payload: `[u32 len][utf8 bytes]`.
///
/// The caller is the client, which may send up to [`MAX_PAYLOAD`] bytes of
/// name (the server is the one that trims it down to its own 31-byte
/// budget).
#[must_use]
pub fn encode_name(name: &str) -> BytesMut {
    let bytes = name.as_bytes();
    let mut out = BytesMut::with_capacity(4 + bytes.len());
    out.put_u32(bytes.len() as u32);
    out.put_slice(bytes);
    out
}

/// Decodes a handshake name payload, rejecting anything over
/// [`MAX_STRING`] bytes and any trailing bytes after the string.
pub fn decode_name(mut payload: &[u8]) -> Result<String, ProtocolError> {
    if payload.len() > MAX_PAYLOAD as usize {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len() as u32,
            max: MAX_PAYLOAD,
        });
    }

    if payload.len() < 4 {
        return Err(ProtocolError::UnexpectedEof);
    }
    let len = payload.get_u32();
    if len > MAX_STRING {
        return Err(ProtocolError::StringTooLarge {
            len,
            max: MAX_STRING,
        });
    }
    if payload.len() != len as usize {
        return Err(ProtocolError::WrongPayloadLength {
            expected: len,
            actual: payload.len() as u32,
        });
    }

    String::from_utf8(payload.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Encodes the server's 3-byte color reply.
#[must_use]
pub fn encode_color(color: Color) -> BytesMut {
    let mut out = BytesMut::with_capacity(3);
    out.put_u8(color.r);
    out.put_u8(color.g);
    out.put_u8(color.b);
    out
}

/// Decodes the server's 3-byte color reply.
pub fn decode_color(payload: &[u8]) -> Result<Color, ProtocolError> {
    if payload.len() != 3 {
        return Err(ProtocolError::WrongPayloadLength {
            expected: 3,
            actual: payload.len() as u32,
        });
    }
    Ok(Color {
        r: payload[0],
        g: payload[1],
        b: payload[2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_roundtrips() {
        let encoded = encode_name("cyclist");
        let decoded = decode_name(&encoded).unwrap();
        assert_eq!(decoded, "cyclist");
    }

    #[test]
    fn name_with_trailing_garbage_is_rejected() {
        let mut encoded = encode_name("x").to_vec();
        encoded.push(0xFF);
        assert!(matches!(
            decode_name(&encoded),
            Err(ProtocolError::WrongPayloadLength { .. })
        ));
    }

    #[test]
    fn color_roundtrips() {
        let color = Color {
            r: 10,
            g: 20,
            b: 30,
        };
        let encoded = encode_color(color);
        assert_eq!(decode_color(&encoded).unwrap(), color);
    }

    #[test]
    fn color_rejects_wrong_length() {
        assert!(matches!(
            decode_color(&[1, 2]),
            Err(ProtocolError::WrongPayloadLength { .. })
        ));
    }
}
