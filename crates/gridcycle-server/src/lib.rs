//! The authoritative game server: binds a listener, runs the accept loop on
//! its own thread, and drives the tick orchestrator on the calling thread
//! until the game is over.
//!
//! The accept thread and the tick thread are the two cooperating flows from
//! §5: they share a [`World`] and a [`SocketTable`] behind mutexes rather
//! than message-passing, because the tick orchestrator needs to own raw
//! sockets directly for its bounded non-blocking comm phase (see
//! `SPEC_FULL.md` §5's note on why this isn't modeled as an `evenio`-style
//! event dispatch the way the teacher's Minecraft entity simulation is).

mod connection;
mod orchestrator;

use std::{
    io,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use anyhow::Context;
use gridcycle_config::Config;
use gridcycle_core::World;
use mio::Poll;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{info, instrument};

pub use connection::SocketTable;
pub use orchestrator::Orchestrator;

/// `listen` backlog (§4.5: "backlog >= 16").
const LISTEN_BACKLOG: i32 = 128;

/// The authoritative game server.
pub struct Server {
    listener: std::net::TcpListener,
    world: Arc<Mutex<World>>,
    sockets: Arc<Mutex<SocketTable>>,
    /// Taken by [`Server::run`] and handed to the [`Orchestrator`]; `Poll`
    /// itself cannot be cloned, only its [`mio::Registry`] (already cloned
    /// into the [`SocketTable`] at construction time).
    poll: Option<Poll>,
    comm_budget: std::time::Duration,
    tick_floor: std::time::Duration,
    accepting: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl Server {
    /// Binds `addr` and constructs the [`World`] from `config`. `addr`
    /// (host/port) is an ambient concern supplied by the embedding binary,
    /// not part of [`Config`] (§6.5).
    #[instrument(skip(config))]
    pub fn bind(addr: SocketAddr, config: Config) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;

        let listener = bind_listener(addr).context("binding TCP listener")?;
        info!(%addr, max_clients = config.max_clients, "gridcycle server listening");

        let world = Arc::new(Mutex::new(World::new(config)));
        let poll = Poll::new().context("creating mio poll")?;
        let registry = poll
            .registry()
            .try_clone()
            .context("cloning poll registry")?;
        let sockets = Arc::new(Mutex::new(SocketTable::new(registry)));

        Ok(Self {
            listener,
            world,
            sockets,
            poll: Some(poll),
            comm_budget: std::time::Duration::from_millis(config.comm_budget_ms),
            tick_floor: std::time::Duration::from_millis(config.tick_floor_ms),
            accepting: Arc::new(AtomicBool::new(true)),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Runs the server to completion: spawns the accept thread, then runs
    /// the tick orchestrator on the calling thread until the game is over
    /// or [`Server::stop`] is called from another thread/signal handler.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let accept_listener = self.listener.try_clone().context("duplicating listener fd")?;
        let accept_world = Arc::clone(&self.world);
        let accept_sockets = Arc::clone(&self.sockets);
        let accepting = Arc::clone(&self.accepting);

        let accept_handle = thread::spawn(move || {
            connection::run_accept_loop(&accept_listener, &accept_world, &accept_sockets, &accepting);
        });

        let poll = self.poll.take().context("Server::run called more than once")?;
        let mut orchestrator =
            Orchestrator::new(&self.world, &self.sockets, poll, self.comm_budget, self.tick_floor);
        orchestrator.run(&self.running);

        self.accepting.store(false, Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);
        accept_handle
            .join()
            .map_err(|_| anyhow::anyhow!("accept thread panicked"))?;

        info!("game over, server shutting down");
        Ok(())
    }

    /// A clone of the running flag, so an external signal handler can
    /// request a clean shutdown without waiting for `is_over()`.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// The address actually bound, useful when `addr`'s port was `0`.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

fn bind_listener(addr: SocketAddr) -> anyhow::Result<std::net::TcpListener> {
    let domain = match addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}
