//! The connection manager (C5): a non-blocking listener, the accept loop,
//! the handshake, and the dense id-indexed socket table.
//!
//! Mirrors the accept-loop shape of `crates/server/src/net/generic.rs` in
//! the teacher repo: a non-blocking listener, `WouldBlock` treated as "no
//! work yet", and every accepted connection registered with a shared `Poll`
//! registry so the tick orchestrator can later multiplex reads across all
//! of them with a single zero-timeout `poll()` call.

use std::{
    io::{self, Read, Write},
    net::SocketAddr,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use gridcycle_core::World;
use gridcycle_proto::{MAX_PAYLOAD, ProtocolError, decode_name, encode_color, encode_frame};
use mio::{Interest, Registry, Token, net::TcpStream};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// How long the accept loop sleeps between polls while at capacity or
/// while no connection is pending (§4.5 step 1/2).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// Everything that can go wrong completing a handshake. Always recovered
/// locally by the accept loop: the connection is closed and discarded.
#[derive(Debug, Error)]
enum HandshakeError {
    #[error("transport error during handshake: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error during handshake: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("server full or grid full: {0}")]
    Spawn(#[from] gridcycle_core::SpawnError),
}

/// The dense, id-indexed socket table: one slot per wire id (`0..=255`,
/// slot `0` unused since id `0` is reserved). Every inserted socket is
/// registered for readability with a cloned [`Registry`] handle so the tick
/// orchestrator's `Poll` observes it without the accept thread holding the
/// `Poll` itself.
pub struct SocketTable {
    registry: Registry,
    sockets: Box<[Option<TcpStream>; 256]>,
    len: usize,
}

impl SocketTable {
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            sockets: Box::new(std::array::from_fn(|_| None)),
            len: 0,
        }
    }

    /// Installs `stream` at slot `id`, registering it for readability.
    pub fn insert(&mut self, id: u8, mut stream: TcpStream) -> io::Result<()> {
        self.registry
            .register(&mut stream, Token(id as usize), Interest::READABLE)?;
        if self.sockets[id as usize].replace(stream).is_none() {
            self.len += 1;
        }
        Ok(())
    }

    pub fn get_mut(&mut self, id: u8) -> Option<&mut TcpStream> {
        self.sockets[id as usize].as_mut()
    }

    /// Removes and closes the socket at `id`, freeing the slot.
    pub fn remove(&mut self, id: u8) -> Option<TcpStream> {
        let removed = self.sockets[id as usize].take();
        if let Some(mut stream) = removed {
            let _ = self.registry.deregister(&mut stream);
            self.len -= 1;
            return Some(stream);
        }
        None
    }

    /// All currently-installed ids, in slot order.
    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.sockets
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.is_some().then(|| i as u8))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Runs the accept loop until `accepting` is cleared. Intended to run on
/// its own thread; every successfully handshaken connection is installed
/// into `sockets` and its player spawned into `world`.
#[instrument(skip_all)]
pub fn run_accept_loop(
    listener: &std::net::TcpListener,
    world: &Mutex<World>,
    sockets: &Mutex<SocketTable>,
    accepting: &AtomicBool,
) {
    while accepting.load(Ordering::Relaxed) {
        let at_capacity = {
            let registered = sockets.lock().expect("socket table mutex poisoned").len();
            let max_clients = world
                .lock()
                .expect("world mutex poisoned")
                .config()
                .max_clients as usize;
            registered >= max_clients
        };
        if at_capacity {
            thread::sleep(ACCEPT_BACKOFF);
            continue;
        }

        match listener.accept() {
            Ok((stream, addr)) => handle_new_connection(stream, addr, world, sockets),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(err) => {
                warn!(%err, "accept() failed");
                thread::sleep(ACCEPT_BACKOFF);
            }
        }
    }
    info!("accept loop stopped");
}

fn handle_new_connection(
    mut stream: std::net::TcpStream,
    addr: SocketAddr,
    world: &Mutex<World>,
    sockets: &Mutex<SocketTable>,
) {
    // Switch to blocking mode for the handshake (§4.5 step 3): a stalled
    // handshake only holds up the accept loop, never the tick loop.
    if let Err(err) = stream.set_nonblocking(false) {
        warn!(%addr, %err, "could not switch new connection to blocking mode");
        return;
    }

    let outcome = complete_handshake(&mut stream, world);
    match outcome {
        Ok(id) => {
            if let Err(err) = stream.set_nonblocking(true) {
                warn!(%addr, id, %err, "could not switch to non-blocking mode after handshake");
                world.lock().expect("world mutex poisoned").remove_player(id);
                return;
            }
            let mio_stream = TcpStream::from_std(stream);
            if let Err(err) = sockets
                .lock()
                .expect("socket table mutex poisoned")
                .insert(id, mio_stream)
            {
                warn!(%addr, id, %err, "could not register new connection");
                world.lock().expect("world mutex poisoned").remove_player(id);
                return;
            }
            info!(%addr, id, "player connected");
        }
        Err(err) => {
            debug!(%addr, %err, "handshake failed, dropping connection");
        }
    }
}

/// Performs the two-step handshake (§6.2): receive the name frame, spawn
/// the player, send back the assigned color. Returns the new player's id.
fn complete_handshake(
    stream: &mut std::net::TcpStream,
    world: &Mutex<World>,
) -> Result<u8, HandshakeError> {
    let name_payload = recv_blocking_frame(stream, MAX_PAYLOAD)?;
    let name = decode_name(&name_payload)?;

    let (id, color) = {
        let mut world = world.lock().expect("world mutex poisoned");
        let id = world.add_player(&name)?;
        let color = world.player(id).expect("just spawned").color;
        (id, color)
    };

    let color_frame = encode_frame(&encode_color(color));
    if let Err(err) = stream.write_all(&color_frame) {
        world.lock().expect("world mutex poisoned").remove_player(id);
        return Err(err.into());
    }

    Ok(id)
}

/// Blockingly reads one `[u32 len][bytes]` frame, rejecting zero-length and
/// over-`max_len` frames the same way the async path does.
fn recv_blocking_frame(
    stream: &mut std::net::TcpStream,
    max_len: u32,
) -> Result<Vec<u8>, HandshakeError> {
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
    use std::net::TcpListener as StdTcpListener;

    use gridcycle_config::Config;
    use mio::Poll;

    use super::*;

    #[test]
    fn accept_loop_completes_a_handshake_and_installs_the_socket() {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let world = Mutex::new(World::new(Config {
            max_clients: 2,
            ..Config::default()
        }));
        let poll = Poll::new().unwrap();
        let registry = poll.registry().try_clone().unwrap();
        let sockets = Mutex::new(SocketTable::new(registry));

        let client_thread = thread::spawn(move || {
            let mut client = std::net::TcpStream::connect(addr).unwrap();
            let frame = encode_frame(&gridcycle_proto::encode_name("tester"));
            client.write_all(&frame).unwrap();

            let mut len = [0u8; 4];
            client.read_exact(&mut len).unwrap();
            assert_eq!(u32::from_be_bytes(len), 3);
            let mut color = [0u8; 3];
            client.read_exact(&mut color).unwrap();
            client
        });

        // Drive just enough of the accept loop inline to service one
        // connection, rather than spawning the full loop on a thread.
        let stop_after = std::time::Instant::now() + Duration::from_secs(2);
        while world.lock().unwrap().player(1).is_none() && std::time::Instant::now() < stop_after {
            match listener.accept() {
                Ok((stream, addr)) => handle_new_connection(stream, addr, &world, &sockets),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(err) => panic!("accept failed: {err}"),
            }
        }

        client_thread.join().unwrap();

        assert_eq!(sockets.lock().unwrap().len(), 1);
        assert!(world.lock().unwrap().player(1).is_some());
    }
}
