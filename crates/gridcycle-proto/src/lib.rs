//! The wire protocol: big-endian, length-prefixed framing over TCP.
//!
//! Every frame on the wire is `[u32 length][length bytes of payload]`, length
//! and all multi-byte fields inside the payload big-endian. Strings are
//! `[u32 len][bytes]`, no NUL terminator. This crate is shared by the server
//! and client so both sides can never disagree about layout.

mod error;
mod frame;
mod handshake;
mod r#move;
mod snapshot;

pub use error::ProtocolError;
pub use frame::{FrameDecoder, encode_frame};
pub use handshake::{decode_color, decode_name, encode_color, encode_name};
pub use r#move::{decode_move, encode_move};
pub use snapshot::{PlayerSnapshot, WorldSnapshot, decode_snapshot, encode_snapshot};

/// Largest frame (outer length-prefixed unit) the codec will accept.
pub const MAX_PACKET: u32 = 32 * 1024 * 1024;

/// Largest `[u32 len][bytes]` string the codec will accept.
pub const MAX_STRING: u32 = 16 * 1024 * 1024;

/// Largest handshake name payload the codec will accept.
pub const MAX_PAYLOAD: u32 = 64 * 1024;

/// Color the server assigns a player: plain RGB, no alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}
