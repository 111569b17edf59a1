//! The tick orchestrator (C6): per-tick send-state / collect-moves with a
//! bounded communication budget, move application, and FPS pacing.
//!
//! The send/recv loop follows the same non-blocking, `WouldBlock`-as-normal
//! shape as `handle_connection_event` in the teacher's
//! `crates/server/src/net/generic.rs`, but collapsed into one thread: the
//! tick itself is the scheduler (§9 "non-blocking I/O with a per-tick
//! budget"), so there is no separate reactor thread to hand events to.

use std::{
    collections::{HashMap, HashSet},
    io::{self, ErrorKind, Read, Write},
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use gridcycle_core::World;
use gridcycle_geometry::Direction;
use gridcycle_proto::{decode_move, encode_frame};
use mio::{Events, Poll};
use tracing::{instrument, trace, warn};

use crate::connection::SocketTable;

/// How long a single non-blocking read pulls into the scratch buffer before
/// giving the event loop a chance to move on to another socket.
const READ_CHUNK: usize = 512;

/// How long the comm-phase loop naps when an iteration did no I/O at all,
/// to avoid spinning a core at 100% while waiting for slow clients.
const IDLE_NAP: Duration = Duration::from_millis(1);

pub struct Orchestrator<'a> {
    world: &'a Mutex<World>,
    sockets: &'a Mutex<SocketTable>,
    poll: Poll,
    events: Events,
    comm_budget: Duration,
    tick_floor: Duration,
}

impl<'a> Orchestrator<'a> {
    #[must_use]
    pub fn new(
        world: &'a Mutex<World>,
        sockets: &'a Mutex<SocketTable>,
        poll: Poll,
        comm_budget: Duration,
        tick_floor: Duration,
    ) -> Self {
        Self {
            world,
            sockets,
            poll,
            events: Events::with_capacity(256),
            comm_budget,
            tick_floor,
        }
    }

    /// Runs ticks until `running` is cleared or the world reports
    /// [`World::is_over`] (§4.6 step 8).
    pub fn run(&mut self, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            if self.world.lock().expect("world mutex poisoned").is_over() {
                break;
            }
            self.run_tick();
        }
    }

    /// Runs exactly one tick: bounded send/recv, move application, pacing.
    #[instrument(skip_all)]
    fn run_tick(&mut self) {
        let tick_start = Instant::now();

        let payload = {
            let world = self.world.lock().expect("world mutex poisoned");
            gridcycle_proto::encode_snapshot(&world.snapshot())
        };
        let outgoing_frame = encode_frame(&payload);

        let mut pending_send: HashSet<u8> = self
            .sockets
            .lock()
            .expect("socket table mutex poisoned")
            .ids()
            .collect();
        let mut pending_recv: HashSet<u8> = HashSet::new();

        let mut send_buffers: HashMap<u8, Vec<u8>> = HashMap::new();
        let mut recv_buffers: HashMap<u8, Vec<u8>> = HashMap::new();
        let mut directions: HashMap<u8, Direction> = HashMap::new();

        while !(pending_send.is_empty() && pending_recv.is_empty())
            && tick_start.elapsed() < self.comm_budget
        {
            let did_work = self.drive_sends(
                &mut pending_send,
                &mut pending_recv,
                &mut send_buffers,
                &outgoing_frame,
            ) | self.drive_recvs(
                &mut pending_send,
                &mut pending_recv,
                &mut recv_buffers,
                &mut directions,
            );

            if pending_send.is_empty() && pending_recv.is_empty() {
                break;
            }
            if !did_work {
                thread::sleep(IDLE_NAP);
            }
        }

        // Anything still outstanding blew the comm budget; drop it (§4.6
        // step 4, §5 cancellation/timeout).
        let stragglers: Vec<u8> = pending_send.iter().chain(pending_recv.iter()).copied().collect();
        for id in stragglers {
            warn!(id, "client exceeded comm budget, dropping");
            self.drop_client(id, &mut pending_send, &mut pending_recv);
        }

        {
            let mut world = self.world.lock().expect("world mutex poisoned");
            world.advance(&directions);
        }

        let elapsed = tick_start.elapsed();
        if elapsed < self.tick_floor {
            thread::sleep(self.tick_floor - elapsed);
        }
    }

    /// Attempts one non-blocking write per id still in `pending_send`.
    /// Returns whether any socket made forward progress this pass.
    fn drive_sends(
        &mut self,
        pending_send: &mut HashSet<u8>,
        pending_recv: &mut HashSet<u8>,
        send_buffers: &mut HashMap<u8, Vec<u8>>,
        outgoing_frame: &[u8],
    ) -> bool {
        let mut completed = Vec::new();
        let mut failed = Vec::new();
        let mut progressed = false;

        {
            let mut sockets = self.sockets.lock().expect("socket table mutex poisoned");
            for &id in pending_send.iter() {
                let buf = send_buffers
                    .entry(id)
                    .or_insert_with(|| outgoing_frame.to_vec());

                let Some(stream) = sockets.get_mut(id) else {
                    failed.push(id);
                    continue;
                };

                match stream.write(buf) {
                    Ok(0) => {}
                    Ok(n) => {
                        buf.drain(..n);
                        progressed = true;
                        if buf.is_empty() {
                            completed.push(id);
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                    Err(err) => {
                        trace!(id, %err, "send failed");
                        failed.push(id);
                    }
                }
            }
        }

        for id in completed {
            pending_send.remove(&id);
            pending_recv.insert(id);
            send_buffers.remove(&id);
        }
        for id in failed {
            self.drop_client(id, pending_send, pending_recv);
        }

        progressed
    }

    /// Polls the shared registry with a zero timeout and attempts one
    /// non-blocking read per ready id still in `pending_recv`. Returns
    /// whether any socket made forward progress this pass.
    fn drive_recvs(
        &mut self,
        pending_send: &mut HashSet<u8>,
        pending_recv: &mut HashSet<u8>,
        recv_buffers: &mut HashMap<u8, Vec<u8>>,
        directions: &mut HashMap<u8, Direction>,
    ) -> bool {
        if pending_recv.is_empty() {
            return false;
        }

        if let Err(err) = self.poll.poll(&mut self.events, Some(Duration::ZERO)) {
            warn!(%err, "poll failed");
            return false;
        }
        let ready: HashSet<u8> = self
            .events
            .iter()
            .map(|event| event.token().0 as u8)
            .collect();

        let mut completed = Vec::new();
        let mut failed = Vec::new();
        let mut progressed = false;

        {
            let mut sockets = self.sockets.lock().expect("socket table mutex poisoned");
            for &id in pending_recv.iter() {
                if !ready.contains(&id) {
                    continue;
                }
                let Some(stream) = sockets.get_mut(id) else {
                    failed.push(id);
                    continue;
                };

                let buf = recv_buffers.entry(id).or_default();
                match read_available(stream, buf) {
                    Ok(true) => failed.push(id),
                    Ok(false) => {
                        progressed = true;
                        match try_decode_move(buf) {
                            Ok(Some(raw_direction)) => {
                                directions.insert(id, Direction::from_wire(raw_direction));
                                completed.push(id);
                            }
                            Ok(None) => {}
                            Err(err) => {
                                trace!(id, %err, "malformed move frame");
                                failed.push(id);
                            }
                        }
                    }
                    Err(err) => {
                        trace!(id, %err, "recv failed");
                        failed.push(id);
                    }
                }
            }
        }

        for id in completed {
            pending_recv.remove(&id);
            recv_buffers.remove(&id);
        }
        for id in failed {
            self.drop_client(id, pending_send, pending_recv);
        }

        progressed
    }

    /// Removes `id` from both pending sets, closes its socket, and removes
    /// its player from the world (§4.6 step 4/5, §5 cancellation).
    fn drop_client(&self, id: u8, pending_send: &mut HashSet<u8>, pending_recv: &mut HashSet<u8>) {
        pending_send.remove(&id);
        pending_recv.remove(&id);
        self.sockets.lock().expect("socket table mutex poisoned").remove(id);
        self.world.lock().expect("world mutex poisoned").remove_player(id);
    }
}

/// Reads whatever is immediately available into `buf`. Returns `Ok(true)`
/// if the peer closed the connection.
fn read_available(stream: &mut impl Read, buf: &mut Vec<u8>) -> io::Result<bool> {
    let mut scratch = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut scratch) {
            Ok(0) => return Ok(true),
            Ok(n) => {
                buf.extend_from_slice(&scratch[..n]);
                if n < scratch.len() {
                    return Ok(false);
                }
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(false),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

/// Tries to decode a complete move frame (outer length must be exactly 4,
/// §6.4) off the front of `buf`. `Ok(None)` means not enough bytes yet.
fn try_decode_move(buf: &mut Vec<u8>) -> Result<Option<u32>, gridcycle_proto::ProtocolError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let len = u32::from_be_bytes(buf[..4].try_into().expect("checked above"));
    if len != 4 {
        return Err(gridcycle_proto::ProtocolError::WrongPayloadLength {
            expected: 4,
            actual: len,
        });
    }
    if buf.len() < 8 {
        return Ok(None);
    }
    let direction = decode_move(&buf[4..8])?;
    buf.drain(..8);
    Ok(Some(direction))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_decode_move_waits_for_a_full_frame() {
        let mut buf = vec![0, 0, 0, 4];
        assert_eq!(try_decode_move(&mut buf).unwrap(), None);

        buf.extend_from_slice(&1u32.to_be_bytes());
        assert_eq!(try_decode_move(&mut buf).unwrap(), Some(1));
        assert!(buf.is_empty());
    }

    #[test]
    fn try_decode_move_rejects_wrong_outer_length() {
        let mut buf = vec![0, 0, 0, 5];
        assert!(try_decode_move(&mut buf).is_err());
    }

    #[test]
    fn try_decode_move_leaves_trailing_bytes_for_the_next_frame() {
        let mut buf = vec![0, 0, 0, 4, 0, 0, 0, 2, 0, 0, 0, 4];
        assert_eq!(try_decode_move(&mut buf).unwrap(), Some(2));
        assert_eq!(buf, vec![0, 0, 0, 4]);
    }
}
