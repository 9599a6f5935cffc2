//! # Transport Layer
//!
//! TCP sockets on worker threads, marshalled onto the simulation thread
//! through channels.
//!
//! ## Design
//!
//! - One accept thread, one command thread, and a reader plus a writer
//!   thread per connection
//! - Each connection has its own bounded outbox; a peer that stops reading
//!   is closed instead of stalling the others
//! - The session never touches a socket; it reads [`NetworkEvent`]s and
//!   queues [`NetworkCommand`]s
//! - Every accepted connection produces exactly one `ClientConnected` and
//!   one `ClientDisconnected`
//! - The client side mirrors this with [`LinkEvent`] / [`LinkCommand`]

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "stats")]
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::protocol::{read_frame, write_frame};
use crate::server::ConnectionId;

/// Depth of the inbound event queue.
pub const EVENT_QUEUE_DEPTH: usize = 4096;

/// Frames queued per connection before it counts as stalled.
pub const PEER_QUEUE_DEPTH: usize = 256;

/// How long one frame write may block before the connection is dropped.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the accept loop sleeps when no connection is pending.
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Transport to session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A socket was accepted.
    ClientConnected(ConnectionId, SocketAddr),
    /// The socket closed, for whatever reason.
    ClientDisconnected(ConnectionId),
    /// One complete frame arrived.
    PacketReceived {
        /// Sending connection.
        from: ConnectionId,
        /// Frame payload.
        data: Vec<u8>,
    },
}

/// Session to transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkCommand {
    /// Write one frame.
    Send {
        /// Target connection.
        to: ConnectionId,
        /// Frame payload.
        data: Vec<u8>,
    },
    /// Close one connection.
    Disconnect(ConnectionId),
    /// Close everything and stop the worker threads.
    Shutdown,
}

/// Frame and byte counters.
#[cfg(feature = "stats")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TransportStats {
    /// Frames written.
    pub frames_sent: u64,
    /// Frames read.
    pub frames_received: u64,
    /// Payload bytes written.
    pub bytes_sent: u64,
    /// Payload bytes read.
    pub bytes_received: u64,
    /// Failed writes.
    pub send_errors: u64,
}

#[cfg(feature = "stats")]
#[derive(Debug, Default)]
struct Counters {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    send_errors: AtomicU64,
}

#[cfg(feature = "stats")]
impl Counters {
    fn sent(&self, len: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
    }

    fn received(&self, len: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    fn send_failed(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TransportStats {
        TransportStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

/// One accepted connection as the writer side sees it.
struct Peer {
    /// Handle kept for shutting the socket down.
    stream: TcpStream,
    /// Frames waiting for this peer's writer thread.
    outbox: Sender<Vec<u8>>,
}

/// State shared by the worker threads.
struct Shared {
    peers: Mutex<HashMap<ConnectionId, Peer>>,
    shutdown: AtomicBool,
    events: Sender<NetworkEvent>,
    #[cfg(feature = "stats")]
    counters: Counters,
}

impl Shared {
    /// Closes one socket; its reader thread then reports the disconnect.
    fn close(&self, id: ConnectionId) {
        if let Some(peer) = self.peers.lock().get(&id) {
            let _ = peer.stream.shutdown(Shutdown::Both);
        }
    }
}

/// Listening TCP transport for the relay server.
pub struct TcpServerTransport {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    commands: Sender<NetworkCommand>,
    threads: Vec<JoinHandle<()>>,
}

impl TcpServerTransport {
    /// Binds the listener and starts the worker threads.
    ///
    /// Returns the transport plus the session's ends of both channels.
    ///
    /// # Errors
    ///
    /// If the address cannot be bound or a thread cannot be spawned.
    pub fn bind(
        addr: impl ToSocketAddrs,
        max_clients: usize,
    ) -> io::Result<(Self, Receiver<NetworkEvent>, Sender<NetworkCommand>)> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let (event_tx, event_rx) = bounded(EVENT_QUEUE_DEPTH);
        let (command_tx, command_rx) = unbounded();

        let shared = Arc::new(Shared {
            peers: Mutex::new(HashMap::new()),
            shutdown: AtomicBool::new(false),
            events: event_tx,
            #[cfg(feature = "stats")]
            counters: Counters::default(),
        });

        let accept = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("tarmac-accept".into())
                .spawn(move || accept_loop(&listener, &shared, max_clients))?
        };
        let dispatcher = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("tarmac-commands".into())
                .spawn(move || command_loop(&command_rx, &shared))?
        };

        info!(target: "network", "listening on {local_addr}");

        Ok((
            Self {
                local_addr,
                shared,
                commands: command_tx.clone(),
                threads: vec![accept, dispatcher],
            },
            event_rx,
            command_tx,
        ))
    }

    /// Bound address (useful with port 0).
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.shared.peers.lock().len()
    }

    /// Frame and byte counters.
    #[cfg(feature = "stats")]
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        self.shared.counters.snapshot()
    }

    /// Closes every connection and joins the worker threads.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        let _ = self.commands.send(NetworkCommand::Shutdown);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for TcpServerTransport {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.stop();
        }
    }
}

fn accept_loop(listener: &TcpListener, shared: &Arc<Shared>, max_clients: usize) {
    let mut next_id = 0u32;

    while !shared.shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                if shared.peers.lock().len() >= max_clients {
                    warn!(target: "network", "refusing {addr}: server full ({max_clients})");
                    let _ = stream.shutdown(Shutdown::Both);
                    continue;
                }
                let id = ConnectionId(next_id);
                next_id = next_id.wrapping_add(1);
                if let Err(e) = spawn_peer(stream, id, addr, shared) {
                    warn!(target: "network", "cannot serve {addr}: {e}");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => warn!(target: "network", "accept failed: {e}"),
        }
    }
}

/// Starts the reader and writer threads of a freshly accepted socket.
fn spawn_peer(stream: TcpStream, id: ConnectionId, addr: SocketAddr, shared: &Arc<Shared>) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    let handle = stream.try_clone()?;
    let writer = stream.try_clone()?;

    let (outbox, frames) = bounded(PEER_QUEUE_DEPTH);
    {
        let shared = Arc::clone(shared);
        thread::Builder::new()
            .name(format!("tarmac-writer-{}", id.0))
            .spawn(move || write_loop(writer, id, &frames, &shared))?;
    }

    shared.peers.lock().insert(id, Peer { stream: handle, outbox });
    info!(target: "network", "connection {} from {addr}", id.0);
    if shared.events.send(NetworkEvent::ClientConnected(id, addr)).is_err() {
        if let Some(peer) = shared.peers.lock().remove(&id) {
            let _ = peer.stream.shutdown(Shutdown::Both);
        }
        return Ok(());
    }

    let worker = Arc::clone(shared);
    let spawned = thread::Builder::new()
        .name(format!("tarmac-reader-{}", id.0))
        .spawn(move || read_loop(stream, id, &worker));

    if let Err(e) = spawned {
        // ClientConnected is already out, so it still needs its pair
        if let Some(peer) = shared.peers.lock().remove(&id) {
            let _ = peer.stream.shutdown(Shutdown::Both);
        }
        let _ = shared.events.send(NetworkEvent::ClientDisconnected(id));
        return Err(e);
    }
    Ok(())
}

fn read_loop(mut stream: TcpStream, id: ConnectionId, shared: &Shared) {
    loop {
        match read_frame(&mut stream) {
            Ok(Some(data)) => {
                #[cfg(feature = "stats")]
                shared.counters.received(data.len());
                if shared.events.send(NetworkEvent::PacketReceived { from: id, data }).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(target: "network", "connection {} read error: {e}", id.0);
                break;
            }
        }
    }

    // dropping the peer closes its outbox, which ends the writer thread
    if let Some(peer) = shared.peers.lock().remove(&id) {
        let _ = peer.stream.shutdown(Shutdown::Both);
    }
    info!(target: "network", "connection {} closed", id.0);
    let _ = shared.events.send(NetworkEvent::ClientDisconnected(id));
}

/// Drains one peer's outbox. A failed or timed-out write closes the peer.
fn write_loop(mut stream: TcpStream, id: ConnectionId, frames: &Receiver<Vec<u8>>, shared: &Shared) {
    while let Ok(data) = frames.recv() {
        match write_frame(&mut stream, &data) {
            Ok(()) => {
                #[cfg(feature = "stats")]
                shared.counters.sent(data.len());
            }
            Err(e) => {
                #[cfg(feature = "stats")]
                shared.counters.send_failed();
                warn!(target: "network", "write to connection {} failed: {e}", id.0);
                let _ = stream.shutdown(Shutdown::Both);
                break;
            }
        }
    }
    #[cfg(not(feature = "stats"))]
    let _ = shared;
}

fn command_loop(commands: &Receiver<NetworkCommand>, shared: &Shared) {
    // a closed channel means the session is gone
    while let Ok(command) = commands.recv() {
        match command {
            NetworkCommand::Send { to, data } => {
                let queued = match shared.peers.lock().get(&to) {
                    Some(peer) => peer.outbox.try_send(data),
                    None => {
                        debug!(target: "network", "dropping frame for closed connection {}", to.0);
                        continue;
                    }
                };
                if let Err(TrySendError::Full(_)) = queued {
                    #[cfg(feature = "stats")]
                    shared.counters.send_failed();
                    warn!(target: "network", "connection {} is not keeping up, closing it", to.0);
                    shared.close(to);
                }
            }
            NetworkCommand::Disconnect(id) => shared.close(id),
            NetworkCommand::Shutdown => break,
        }
    }

    shared.shutdown.store(true, Ordering::Relaxed);
    for peer in shared.peers.lock().values() {
        let _ = peer.stream.shutdown(Shutdown::Both);
    }
}

// =============================================================================
// CLIENT SIDE
// =============================================================================

/// Transport to client session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// The socket is open.
    Connected,
    /// The socket closed.
    Disconnected,
    /// One complete frame arrived.
    Received(Vec<u8>),
}

/// Client session to transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkCommand {
    /// Write one frame.
    Send(Vec<u8>),
    /// Close the socket.
    Close,
}

/// The client session's end of a connection.
#[derive(Debug)]
pub struct ClientLink {
    events: Receiver<LinkEvent>,
    commands: Sender<LinkCommand>,
}

impl ClientLink {
    /// Wraps existing channel ends; the other ends belong to the transport.
    #[must_use]
    pub const fn new(events: Receiver<LinkEvent>, commands: Sender<LinkCommand>) -> Self {
        Self { events, commands }
    }

    /// Connects synchronously and starts the reader and writer threads.
    ///
    /// `LinkEvent::Connected` is the first event on the returned link.
    ///
    /// # Errors
    ///
    /// If the connection cannot be established.
    pub fn connect_tcp(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let mut reader = stream.try_clone()?;
        let mut writer = stream;

        let (event_tx, event_rx) = bounded(EVENT_QUEUE_DEPTH);
        let (command_tx, command_rx) = unbounded::<LinkCommand>();

        let _ = event_tx.send(LinkEvent::Connected);

        thread::Builder::new().name("tarmac-link-reader".into()).spawn(move || {
            loop {
                match read_frame(&mut reader) {
                    Ok(Some(data)) => {
                        if event_tx.send(LinkEvent::Received(data)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!(target: "network", "link read error: {e}");
                        break;
                    }
                }
            }
            let _ = event_tx.send(LinkEvent::Disconnected);
        })?;

        thread::Builder::new().name("tarmac-link-writer".into()).spawn(move || {
            while let Ok(command) = command_rx.recv() {
                match command {
                    LinkCommand::Send(data) => {
                        if let Err(e) = write_frame(&mut writer, &data) {
                            warn!(target: "network", "link write failed: {e}");
                            break;
                        }
                    }
                    LinkCommand::Close => break,
                }
            }
            let _ = writer.shutdown(Shutdown::Both);
        })?;

        Ok(Self::new(event_rx, command_tx))
    }

    /// Next pending event, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<LinkEvent> {
        self.events.try_recv().ok()
    }

    /// Queues a command. Returns false if the transport is gone.
    pub fn send(&self, command: LinkCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}
