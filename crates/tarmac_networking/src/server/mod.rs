//! # Relay Server
//!
//! The authoritative session of a TARMAC race.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       RELAY SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ TCP threads  │──│ Session      │──│ Race server  │       │
//! │  │ (transport)  │  │ (handshake,  │  │ (racers,     │       │
//! │  │              │  │  roster)     │  │  relay)      │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! - Everything here runs on one thread; sockets only speak through channels
//! - The server never simulates; car states are relayed as received
//! - A relayed event goes to every other identified connection, never back
//!   to its sender

mod connection;
mod race;
mod tick;

pub use connection::{ConnectionId, ConnectionState, Player};
pub use race::{RacePlayer, RaceServer, Relay};
pub use tick::{TickLoop, TickStats};

use std::collections::BTreeMap;
use std::net::SocketAddr;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tarmac_race::LevelLoader;
use tarmac_shared::PROTOCOL_VERSION;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::NetResult;
use crate::protocol::{decode, Event, EventSerializer, GoodbyeReason};
use crate::transport::{NetworkCommand, NetworkEvent};

/// The relay server session.
pub struct Server {
    config: ServerConfig,
    loader: Box<dyn LevelLoader + Send>,
    events: Receiver<NetworkEvent>,
    commands: Sender<NetworkCommand>,
    connections: BTreeMap<ConnectionId, Player>,
    race: RaceServer,
    serializer: EventSerializer,
}

impl Server {
    /// Creates a session over the given transport channels.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        loader: Box<dyn LevelLoader + Send>,
        events: Receiver<NetworkEvent>,
        commands: Sender<NetworkCommand>,
    ) -> Self {
        let race = RaceServer::new(config.relay_race_start);
        Self {
            config,
            loader,
            events,
            commands,
            connections: BTreeMap::new(),
            race,
            serializer: EventSerializer::new(),
        }
    }

    /// Active configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Race state.
    #[inline]
    #[must_use]
    pub const fn race(&self) -> &RaceServer {
        &self.race
    }

    /// Open connections, identified or not.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Record of connection `id`.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&Player> {
        self.connections.get(&id)
    }

    /// Names of welcomed players, in connection order.
    pub fn player_names(&self) -> impl Iterator<Item = &str> {
        self.connections.values().filter_map(Player::name)
    }

    /// Handles every pending transport event. Returns how many there were.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_network_event(event);
            handled += 1;
        }
        handled
    }

    /// Handles one transport event.
    pub fn handle_network_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::ClientConnected(id, addr) => self.on_connected(id, addr),
            NetworkEvent::ClientDisconnected(id) => self.on_disconnected(id),
            NetworkEvent::PacketReceived { from, data } => self.on_packet(from, &data),
        }
    }

    /// Starts a race on `level_id` for every welcomed player, replacing any
    /// race in progress.
    ///
    /// # Errors
    ///
    /// [`crate::NetError::Race`] if the level cannot be loaded; the current
    /// race is kept in that case.
    pub fn start_race(&mut self, level_id: &str) -> NetResult<()> {
        let data = self.loader.load(level_id)?;

        if self.race.is_initialized() {
            self.race.destroy();
        }

        let players = self
            .connections
            .iter()
            .filter_map(|(id, player)| player.name().map(|name| (*id, name)));
        self.race.initialize(level_id, data, players);

        self.broadcast(&Event::InitRace(level_id.to_string()), None);
        if let Some(state) = self.race.game_state() {
            self.broadcast(&Event::GameState(state), None);
        }
        Ok(())
    }

    /// Ends the race in progress, if any.
    pub fn stop_race(&mut self) {
        if self.race.is_initialized() {
            self.race.destroy();
        }
    }

    /// Asks the transport to close everything.
    pub fn shutdown(&self) {
        let _ = self.commands.try_send(NetworkCommand::Shutdown);
    }

    // =========================================================================
    // TRANSPORT CALLBACKS
    // =========================================================================

    fn on_connected(&mut self, id: ConnectionId, addr: SocketAddr) {
        info!(target: "network", "client {id} connected from {addr}");
        self.connections.insert(id, Player::new(addr));
    }

    fn on_disconnected(&mut self, id: ConnectionId) {
        let Some(player) = self.connections.remove(&id) else {
            return;
        };
        info!(target: "network", "client {id} disconnected");

        if let Some(name) = player.name().filter(|_| player.is_identified()) {
            self.race.remove_player(id);
            self.broadcast(&Event::PlayerDisconnected(name.to_string()), None);
        }
    }

    fn on_packet(&mut self, from: ConnectionId, data: &[u8]) {
        let Some(player) = self.connections.get(&from) else {
            debug!(target: "network", "packet from unknown connection {from}");
            return;
        };
        let identified = player.is_identified();

        let event = match decode(data) {
            Ok(event) => event,
            Err(e) => {
                warn!(target: "protocol", "dropping event from {from}: {e}");
                return;
            }
        };
        debug!(target: "event", "event {} arrived from {from}", event.name());

        match event {
            Event::PlayerInfo { name, protocol_version } if !identified => {
                self.on_player_info(from, &name, protocol_version);
            }
            Event::Race(race_event) if identified => {
                if self.race.handle(from, &race_event) == Relay::Others {
                    self.relay(from, data);
                }
            }
            other => {
                warn!(target: "event", "unhandled event {} from {from}", other.name());
            }
        }
    }

    // =========================================================================
    // HANDSHAKE
    // =========================================================================

    fn on_player_info(&mut self, from: ConnectionId, name: &str, protocol_version: u32) {
        if protocol_version != PROTOCOL_VERSION {
            self.refuse(from, GoodbyeReason::UnsupportedProtocolVersion);
            return;
        }
        if self.player_names().any(|taken| taken == name) {
            self.refuse(from, GoodbyeReason::NameAlreadyInUse);
            return;
        }

        if let Some(player) = self.connections.get_mut(&from) {
            player.identify(name);
        }
        info!(target: "network", "client {from} is now known as {name}");

        self.send(from, &Event::Welcome);

        let others: Vec<String> = self
            .connections
            .iter()
            .filter(|(id, _)| **id != from)
            .filter_map(|(_, player)| player.name().map(str::to_string))
            .collect();
        for other in others {
            self.send(from, &Event::PlayerConnected(other));
        }
        self.broadcast(&Event::PlayerConnected(name.to_string()), Some(from));

        if let Some(level) = self.race.level_id().map(str::to_string) {
            self.race.add_player(from, name);
            self.send(from, &Event::InitRace(level));
            if let Some(state) = self.race.game_state() {
                self.broadcast(&Event::GameState(state), None);
            }
        }
    }

    fn refuse(&mut self, id: ConnectionId, reason: GoodbyeReason) {
        info!(target: "network", "saying goodbye to {id}: {}", reason.message());
        if let Some(player) = self.connections.get_mut(&id) {
            player.close();
        }
        self.send(id, &Event::Goodbye(reason));
        self.command(NetworkCommand::Disconnect(id));
    }

    // =========================================================================
    // OUTPUT
    // =========================================================================

    fn encode(&mut self, event: &Event) -> Option<Vec<u8>> {
        match self.serializer.serialize(event) {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!(target: "protocol", "cannot encode {}: {e}", event.name());
                None
            }
        }
    }

    fn send(&mut self, to: ConnectionId, event: &Event) {
        if let Some(data) = self.encode(event) {
            self.command(NetworkCommand::Send { to, data });
        }
    }

    /// Sends to every identified connection except `except`.
    fn broadcast(&mut self, event: &Event, except: Option<ConnectionId>) {
        if let Some(data) = self.encode(event) {
            self.send_to_identified(&data, except);
        }
    }

    fn relay(&self, from: ConnectionId, data: &[u8]) {
        self.send_to_identified(data, Some(from));
    }

    fn send_to_identified(&self, data: &[u8], except: Option<ConnectionId>) {
        let targets: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(id, player)| Some(**id) != except && player.is_identified())
            .map(|(id, _)| *id)
            .collect();
        for to in targets {
            self.command(NetworkCommand::Send { to, data: data.to_vec() });
        }
    }

    fn command(&self, command: NetworkCommand) {
        match self.commands.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(target: "network", "command queue full, dropping"),
            Err(TrySendError::Disconnected(_)) => debug!(target: "network", "transport is gone"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use tarmac_race::{LevelData, RaceError, RaceResult};

    struct NoLevels;

    impl LevelLoader for NoLevels {
        fn load(&self, id: &str) -> RaceResult<LevelData> {
            Err(RaceError::UnknownLevel(id.to_string()))
        }
    }

    #[test]
    fn test_unknown_level_keeps_server_idle() {
        let (_event_tx, event_rx) = unbounded();
        let (command_tx, command_rx) = unbounded();
        let mut server = Server::new(ServerConfig::default(), Box::new(NoLevels), event_rx, command_tx);

        assert!(server.start_race("nowhere").is_err());
        assert!(!server.race().is_initialized());
        assert!(command_rx.try_recv().is_err());
    }

    #[test]
    fn test_connection_records_follow_transport() {
        let (event_tx, event_rx) = unbounded();
        let (command_tx, _command_rx) = unbounded();
        let mut server = Server::new(ServerConfig::default(), Box::new(NoLevels), event_rx, command_tx);

        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        event_tx.send(NetworkEvent::ClientConnected(ConnectionId(1), addr)).unwrap();
        event_tx.send(NetworkEvent::ClientConnected(ConnectionId(2), addr)).unwrap();
        event_tx.send(NetworkEvent::ClientDisconnected(ConnectionId(1))).unwrap();
        // unknown ids are harmless
        event_tx.send(NetworkEvent::ClientDisconnected(ConnectionId(42))).unwrap();

        assert_eq!(server.pump(), 4);
        assert_eq!(server.connection_count(), 1);
        assert!(server.connection(ConnectionId(2)).is_some());
        assert_eq!(server.player_names().count(), 0);
    }
}
