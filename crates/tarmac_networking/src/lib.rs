//! # TARMAC Networking
//!
//! The event protocol that keeps every driver's simulation in step.
//!
//! ## Architecture
//!
//! - **Protocol**: named events with positional binary arguments, one per
//!   length-prefixed frame
//! - **Transport**: TCP on worker threads, marshalled through channels
//! - **Server**: relays car states verbatim; never simulates
//! - **Client**: runs the race locally and reports its own input changes
//!
//! ## Sync Model
//!
//! ```text
//! CLIENT A                      SERVER                      CLIENT B
//!   |                             |                             |
//!   |-- car_state_change(A) ----->|                             |
//!   |                             |-- car_state_change(A) ----->|
//!   |                             |   (never back to A)         |
//! ```
//!
//! A car's state is sent only when its inputs change, and always whole.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tarmac_networking::{Server, ServerConfig, TcpServerTransport};
//! use tarmac_race::DirectoryLoader;
//!
//! let config = ServerConfig::default();
//! let (transport, events, commands) = TcpServerTransport::bind(&config.bind_address, config.max_clients)?;
//! let loader = Box::new(DirectoryLoader::new(&config.level_dir));
//! let mut server = Server::new(config, loader, events, commands);
//! server.start_race("oval")?;
//! loop {
//!     server.pump();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::{Client, ClientNotification, ClientState, RaceClient, RaceOutput};
pub use config::{ClientConfig, ServerConfig};
pub use error::{NetError, NetResult, ProtocolError, ProtocolResult};
pub use protocol::{decode, encode, Event, GameState, GoodbyeReason, RaceEvent};
pub use server::{ConnectionId, RaceServer, Server, TickLoop};
#[cfg(feature = "stats")]
pub use transport::TransportStats;
pub use transport::{ClientLink, LinkCommand, LinkEvent, NetworkCommand, NetworkEvent, TcpServerTransport};
