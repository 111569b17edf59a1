//! The client library (C7): connect + handshake, receive a world snapshot,
//! send a move, disconnect. Mirrors the wire protocol in `gridcycle-proto`
//! exactly — this crate adds nothing to the wire format, only the
//! synchronous call sequence a client uses to speak it.
//!
//! Not safe to call concurrently on one connection from more than one
//! thread at a time (§4.7) — `&mut self` on every I/O method enforces this
//! the same way a `!Sync` connection handle would.

use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
};

use gridcycle_geometry::Direction;
use gridcycle_proto::{
    Color, MAX_PACKET, ProtocolError, WorldSnapshot, decode_color, decode_snapshot, encode_frame,
    encode_move, encode_name,
};
use thiserror::Error;
use tracing::{debug, instrument};

/// Everything that can go wrong talking to a gridcycle server. Transport
/// and protocol errors are both terminal for the connection (§7):  the
/// caller should treat any `Err` here as "this connection is dead".
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("could not resolve {0}:{1}")]
    UnresolvedAddress(String, u16),
}

/// An established connection to a gridcycle server: the handshake has
/// completed and `color`/`name` are the values the server confirmed.
pub struct GameClient {
    stream: TcpStream,
    pub name: String,
    pub color: Color,
}

impl GameClient {
    /// Connects to `host:port`, sends `name`, and receives the assigned
    /// color (§6.2, §4.7 `connect`).
    #[instrument(skip(name), fields(name))]
    pub fn connect(name: &str, host: &str, port: u16) -> Result<Self, ClientError> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ClientError::UnresolvedAddress(host.to_owned(), port))?;

        let mut stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        stream.write_all(&encode_frame(&encode_name(name)))?;

        let color_payload = recv_frame(&mut stream, 3)?;
        let color = decode_color(&color_payload)?;

        debug!(?color, "connected");
        Ok(Self {
            stream,
            name: name.to_owned(),
            color,
        })
    }

    /// Receives one world snapshot (§6.3, §4.7 `recv_game_state`).
    pub fn recv_game_state(&mut self) -> Result<WorldSnapshot, ClientError> {
        let payload = recv_frame(&mut self.stream, MAX_PACKET)?;
        Ok(decode_snapshot(&payload)?)
    }

    /// Sends one directional move (§6.4, §4.7 `send_move`).
    pub fn send_move(&mut self, direction: Direction) -> Result<(), ClientError> {
        let frame = encode_frame(&encode_move(direction.to_wire()));
        self.stream.write_all(&frame)?;
        Ok(())
    }

    /// Closes the connection. Dropping a [`GameClient`] without calling
    /// this still closes the socket; this just surfaces shutdown errors.
    pub fn disconnect(self) -> Result<(), ClientError> {
        self.stream.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

/// Blockingly reads one `[u32 len][bytes]` frame, rejecting zero-length and
/// over-`max_len` frames (§6.1).
fn recv_frame(stream: &mut TcpStream, max_len: u32) -> Result<Vec<u8>, ClientError> {
    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes);

    if len == 0 {
        return Err(ProtocolError::ZeroLengthFrame.into());
    }
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { len, max: max_len }.into());
    }

    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use std::{net::TcpListener, thread};

    use gridcycle_proto::{PlayerSnapshot, decode_move, decode_name, encode_color, encode_snapshot};

    use super::*;

    fn sample_snapshot() -> WorldSnapshot {
        WorldSnapshot {
            grid_width: 5,
            grid_height: 5,
            players: vec![PlayerSnapshot {
                head_x: 2,
                head_y: 2,
                r: 10,
                g: 20,
                b: 30,
                name: "bob".to_owned(),
                id: 1,
            }],
            frame_number: 7,
            grid: vec![0; 25],
        }
    }

    #[test]
    fn connect_then_recv_snapshot_then_send_move() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let mut len = [0u8; 4];
            stream.read_exact(&mut len).unwrap();
            let mut name_payload = vec![0u8; u32::from_be_bytes(len) as usize];
            stream.read_exact(&mut name_payload).unwrap();
            let name = decode_name(&name_payload).unwrap();
            assert_eq!(name, "cyclist");

            let color_frame = encode_frame(&encode_color(Color {
                r: 1,
                g: 2,
                b: 3,
            }));
            stream.write_all(&color_frame).unwrap();

            let snapshot_frame = encode_frame(&encode_snapshot(&sample_snapshot()));
            stream.write_all(&snapshot_frame).unwrap();

            let mut move_len = [0u8; 4];
            stream.read_exact(&mut move_len).unwrap();
            assert_eq!(u32::from_be_bytes(move_len), 4);
            let mut move_payload = [0u8; 4];
            stream.read_exact(&mut move_payload).unwrap();
            assert_eq!(decode_move(&move_payload).unwrap(), Direction::East.to_wire());
        });

        let mut client = GameClient::connect("cyclist", "127.0.0.1", addr.port()).unwrap();
        assert_eq!(client.color, Color { r: 1, g: 2, b: 3 });

        let snapshot = client.recv_game_state().unwrap();
        assert_eq!(snapshot, sample_snapshot());

        client.send_move(Direction::East).unwrap();
        client.disconnect().unwrap();

        server.join().unwrap();
    }

    #[test]
    fn recv_rejects_zero_length_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut len = [0u8; 4];
            stream.read_exact(&mut len).unwrap();
            let mut name_payload = vec![0u8; u32::from_be_bytes(len) as usize];
            stream.read_exact(&mut name_payload).unwrap();

            let color_frame = encode_frame(&encode_color(Color::default()));
            stream.write_all(&color_frame).unwrap();

            // malformed: zero-length frame where a snapshot was expected.
            stream.write_all(&0u32.to_be_bytes()).unwrap();
        });

        let mut client = GameClient::connect("x", "127.0.0.1", addr.port()).unwrap();
        assert!(matches!(
            client.recv_game_state(),
            Err(ClientError::Protocol(ProtocolError::ZeroLengthFrame))
        ));

        server.join().unwrap();
    }
}
