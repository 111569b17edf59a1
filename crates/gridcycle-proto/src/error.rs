use thiserror::Error;

/// Everything that can go wrong decoding or encoding a frame.
///
/// Kept as a typed enum rather than bare `anyhow::Error` because both the
/// server and the client match on specific variants (a `FrameTooLarge` is a
/// hostile/broken peer and should drop the connection immediately; an
/// `UnexpectedEof` just means "not enough bytes yet" in some call sites).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame length {len} exceeds the maximum of {max}")]
    FrameTooLarge { len: u32, max: u32 },

    #[error("zero-length frame")]
    ZeroLengthFrame,

    #[error("string length {len} exceeds the maximum of {max}")]
    StringTooLarge { len: u32, max: u32 },

    #[error("{remaining} trailing byte(s) after a fully decoded payload")]
    TrailingBytes { remaining: usize },

    #[error("expected payload length {expected}, got {actual}")]
    WrongPayloadLength { expected: u32, actual: u32 },

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("unexpected end of payload")]
    UnexpectedEof,
}
