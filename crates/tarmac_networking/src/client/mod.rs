//! # Game Client
//!
//! Client session: handshake, roster, and the race sub-handler.
//!
//! ## State machine
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──socket open──▶ Connected
//!      ▲                                                    │ welcome
//!      │                                                    ▼
//!      └──────────── any disconnect ─────────── Welcomed ──init_race──▶ Racing
//! ```
//!
//! The session is sans-IO: it reads [`LinkEvent`]s and writes
//! [`LinkCommand`]s. Upstream code polls [`ClientNotification`]s instead of
//! registering callbacks.

mod race;

pub use race::{RaceClient, RaceOutput};

use std::collections::VecDeque;

use tarmac_race::LevelLoader;
use tarmac_shared::PROTOCOL_VERSION;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::{NetError, NetResult};
use crate::protocol::{decode, Event, EventSerializer, GoodbyeReason};
use crate::transport::{ClientLink, LinkCommand, LinkEvent};

/// Client state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Waiting for the socket to open.
    Connecting,
    /// Socket open, identity sent.
    Connected,
    /// Server accepted the identity.
    Welcomed,
    /// A level is loaded and cars are running.
    Racing,
}

/// Things upstream code may want to react to.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientNotification {
    /// The socket opened.
    Connected,
    /// The server welcomed us.
    Welcomed,
    /// The connection is gone.
    Disconnected,
    /// The server turned us away.
    Goodbye(GoodbyeReason),
    /// Another player joined.
    PlayerConnected(String),
    /// Another player left.
    PlayerDisconnected(String),
    /// A race started on this level.
    RaceInitialized(String),
    /// The announced level could not be loaded.
    LevelLoadFailed {
        /// Level id.
        level: String,
        /// Loader error.
        reason: String,
    },
    /// A full snapshot was applied.
    GameStateReceived,
    /// The local car finished a lap.
    LapCompleted(u32),
    /// Someone triggered the race start.
    RaceStartTriggered,
}

/// Game client session.
pub struct Client {
    config: ClientConfig,
    state: ClientState,
    link: Option<ClientLink>,
    roster: Vec<String>,
    race: RaceClient,
    serializer: EventSerializer,
    notifications: VecDeque<ClientNotification>,
}

impl Client {
    /// Creates a disconnected client.
    #[must_use]
    pub fn new(config: ClientConfig, loader: Box<dyn LevelLoader + Send>) -> Self {
        let race = RaceClient::new(config.player_name.clone(), loader);
        Self {
            config,
            state: ClientState::Disconnected,
            link: None,
            roster: Vec::new(),
            race,
            serializer: EventSerializer::new(),
            notifications: VecDeque::new(),
        }
    }

    /// Returns the current client state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ClientState {
        self.state
    }

    /// True once the socket is open.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(
            self.state,
            ClientState::Connected | ClientState::Welcomed | ClientState::Racing
        )
    }

    /// Names of the other players, in join order.
    #[must_use]
    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Race handler.
    #[must_use]
    pub const fn race(&self) -> &RaceClient {
        &self.race
    }

    /// Race handler, for input setters on the local car.
    pub fn race_mut(&mut self) -> &mut RaceClient {
        &mut self.race
    }

    /// Next pending notification.
    pub fn poll_notification(&mut self) -> Option<ClientNotification> {
        self.notifications.pop_front()
    }

    /// Dials the configured server. Blocks until the socket opens or fails.
    ///
    /// # Errors
    ///
    /// [`NetError::Connect`] if the server cannot be reached; the client
    /// stays disconnected and may retry.
    pub fn connect(&mut self) -> NetResult<()> {
        if self.link.is_some() {
            self.disconnect();
        }

        let addr = self.config.server_addr.clone();
        info!(target: "network", "connecting to {addr}");
        self.state = ClientState::Connecting;

        match ClientLink::connect_tcp(addr.as_str()) {
            Ok(link) => {
                self.attach(link);
                Ok(())
            }
            Err(source) => {
                error!(target: "network", "cannot connect to {addr}: {source}");
                self.state = ClientState::Disconnected;
                Err(NetError::Connect { addr, source })
            }
        }
    }

    /// Uses an already-open transport link.
    pub fn attach(&mut self, link: ClientLink) {
        self.link = Some(link);
        self.state = ClientState::Connecting;
    }

    /// Handles every pending link event. Returns how many there were.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.link.as_ref().and_then(ClientLink::try_recv) {
            self.on_link_event(event);
            handled += 1;
        }
        handled
    }

    /// Advances the race and sends local car changes.
    pub fn update(&mut self, elapsed_ms: u32) {
        for output in self.race.update(elapsed_ms) {
            self.on_race_output(output);
        }
    }

    /// Sends one event to the server.
    ///
    /// # Errors
    ///
    /// [`NetError::NotConnected`] without a link, [`NetError::Protocol`] if
    /// the event cannot be encoded, [`NetError::ChannelClosed`] if the
    /// transport is gone.
    pub fn send(&mut self, event: &Event) -> NetResult<()> {
        let link = self.link.as_ref().ok_or(NetError::NotConnected)?;
        let data = self.serializer.serialize(event)?.to_vec();
        if link.send(LinkCommand::Send(data)) {
            Ok(())
        } else {
            Err(NetError::ChannelClosed)
        }
    }

    /// Closes the connection.
    pub fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            link.send(LinkCommand::Close);
        }
        self.on_disconnected();
    }

    // =========================================================================
    // LINK EVENTS
    // =========================================================================

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => self.on_connected(),
            LinkEvent::Disconnected => {
                self.link = None;
                self.on_disconnected();
            }
            LinkEvent::Received(data) => match decode(&data) {
                Ok(event) => self.dispatch(event),
                Err(e) => warn!(target: "protocol", "dropping event: {e}"),
            },
        }
    }

    fn on_connected(&mut self) {
        self.state = ClientState::Connected;
        self.notify(ClientNotification::Connected);

        let name = self.config.player_name.clone();
        info!(target: "network", "introducing myself as {name}");
        let hello = Event::PlayerInfo {
            name,
            protocol_version: PROTOCOL_VERSION,
        };
        if let Err(e) = self.send(&hello) {
            warn!(target: "network", "cannot send player info: {e}");
        }
    }

    fn on_disconnected(&mut self) {
        if self.state == ClientState::Disconnected {
            return;
        }
        info!(target: "network", "disconnected from server");

        self.state = ClientState::Disconnected;
        self.roster.clear();
        self.race.destroy();
        self.notify(ClientNotification::Disconnected);
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    fn dispatch(&mut self, event: Event) {
        debug!(target: "event", "event {} arrived", event.name());

        match event {
            Event::Welcome if self.state == ClientState::Connected => {
                self.state = ClientState::Welcomed;
                info!(target: "network", "connection fully initialized");
                self.notify(ClientNotification::Welcomed);
            }
            Event::Goodbye(reason) => {
                warn!(target: "network", "server said goodbye: {}", reason.message());
                self.notify(ClientNotification::Goodbye(reason));
                self.disconnect();
            }
            Event::PlayerConnected(name) => {
                info!(target: "event", "player '{name}' connected");
                self.roster.push(name.clone());
                self.notify(ClientNotification::PlayerConnected(name));
            }
            Event::PlayerDisconnected(name) => {
                info!(target: "event", "player '{name}' disconnected");
                self.roster.retain(|other| other != &name);
                self.race.remove_player(&name);
                self.notify(ClientNotification::PlayerDisconnected(name));
            }
            Event::InitRace(level) if matches!(self.state, ClientState::Welcomed | ClientState::Racing) => {
                self.on_init_race(level);
            }
            Event::GameState(state) if self.state == ClientState::Racing => {
                self.race.apply_game_state(&state);
                self.notify(ClientNotification::GameStateReceived);
            }
            Event::Race(race_event) if self.state == ClientState::Racing => {
                if let Some(output) = self.race.handle_event(&race_event) {
                    self.on_race_output(output);
                }
            }
            other => {
                warn!(target: "event", "event {} remains unhandled in state {:?}", other.name(), self.state);
            }
        }
    }

    fn on_init_race(&mut self, level: String) {
        match self.race.init(&level) {
            Ok(()) => {
                self.state = ClientState::Racing;
                self.notify(ClientNotification::RaceInitialized(level));
            }
            Err(e) => {
                error!(target: "race", "cannot load level `{level}`: {e}");
                self.state = ClientState::Welcomed;
                self.notify(ClientNotification::LevelLoadFailed {
                    level,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn on_race_output(&mut self, output: RaceOutput) {
        match output {
            RaceOutput::Send(event) => {
                if let Err(e) = self.send(&Event::Race(event)) {
                    debug!(target: "network", "car state not sent: {e}");
                }
            }
            RaceOutput::LapCompleted(lap) => self.notify(ClientNotification::LapCompleted(lap)),
            RaceOutput::RaceStartTriggered => self.notify(ClientNotification::RaceStartTriggered),
        }
    }

    fn notify(&mut self, notification: ClientNotification) {
        self.notifications.push_back(notification);
    }
}
