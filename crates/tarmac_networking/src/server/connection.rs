//! # Connection Records
//!
//! One record per open socket. A connection becomes a player once its
//! `player_info` is accepted.

use std::fmt;
use std::net::SocketAddr;

/// Unique identifier for a client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handshake progress of a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Socket open, no identity yet.
    #[default]
    Connected = 0,
    /// Identity accepted and welcomed.
    Identified = 1,
    /// Goodbye sent; waiting for the socket to close.
    Closing = 2,
}

/// Server-side view of one connection.
#[derive(Clone, Debug)]
pub struct Player {
    addr: SocketAddr,
    state: ConnectionState,
    name: Option<String>,
}

impl Player {
    /// Record for a freshly accepted socket.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            state: ConnectionState::Connected,
            name: None,
        }
    }

    /// Remote address.
    #[inline]
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Handshake state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Accepted display name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True once welcomed.
    #[inline]
    #[must_use]
    pub const fn is_identified(&self) -> bool {
        matches!(self.state, ConnectionState::Identified)
    }

    /// Accepts `name` as this connection's identity.
    pub fn identify(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
        self.state = ConnectionState::Identified;
    }

    /// Marks the connection as being turned away.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closing;
    }
}
