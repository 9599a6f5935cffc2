//! # Protocol Events
//!
//! Every message both peers exchange. Events are decoded once, at the
//! protocol boundary, into these types; nothing downstream compares
//! event names.
//!
//! ## Namespaces
//!
//! | Prefix     | Handled by                    |
//! |------------|-------------------------------|
//! | `general:` | the session itself            |
//! | `race:`    | the race sub-handler, whole   |

use tarmac_race::CarState;

use crate::error::{ProtocolError, ProtocolResult};

/// Prefix of session-level events.
pub const GENERAL_PREFIX: &str = "general:";

/// Prefix of race events.
pub const RACE_PREFIX: &str = "race:";

/// Wire names, one per event.
pub mod names {
    /// Client identity, first event after connecting.
    pub const PLAYER_INFO: &str = "general:player_info";
    /// Server accepted the identity.
    pub const WELCOME: &str = "general:welcome";
    /// Server refused the connection.
    pub const GOODBYE: &str = "general:goodbye";
    /// Another player joined.
    pub const PLAYER_CONNECTED: &str = "general:player_connected";
    /// Another player left.
    pub const PLAYER_DISCONNECTED: &str = "general:player_disconnected";
    /// A race on the named level begins.
    pub const INIT_RACE: &str = "general:init_race";
    /// Full snapshot of every car.
    pub const GAMESTATE: &str = "general:gamestate";
    /// One car's full kinematic state.
    pub const CAR_STATE_CHANGE: &str = "race:car_state_change";
    /// Someone asked for the race to start.
    pub const TRIGGER_RACE_START: &str = "race:trigger_race_start";
}

/// Why the server turned a client away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GoodbyeReason {
    /// Client speaks a different protocol version.
    UnsupportedProtocolVersion = 1,
    /// Another player already uses that name.
    NameAlreadyInUse = 2,
}

impl GoodbyeReason {
    /// Human-readable explanation for the UI.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::UnsupportedProtocolVersion => "Unsupported protocol version",
            Self::NameAlreadyInUse => "This name is already in use",
        }
    }
}

impl TryFrom<u8> for GoodbyeReason {
    type Error = ProtocolError;

    fn try_from(code: u8) -> ProtocolResult<Self> {
        match code {
            1 => Ok(Self::UnsupportedProtocolVersion),
            2 => Ok(Self::NameAlreadyInUse),
            other => Err(ProtocolError::InvalidGoodbyeReason(other)),
        }
    }
}

/// Level id plus one `(name, car state)` pair per player.
///
/// Names and states are kept in lockstep; index `i` of one belongs to
/// index `i` of the other.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GameState {
    level: String,
    names: Vec<String>,
    states: Vec<CarState>,
}

impl GameState {
    /// Empty snapshot for `level`.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            names: Vec::new(),
            states: Vec::new(),
        }
    }

    /// Rebuilds a snapshot from decoded parallel arrays.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::LengthMismatch`] if the arrays differ in length.
    pub fn from_parts(level: String, names: Vec<String>, states: Vec<CarState>) -> ProtocolResult<Self> {
        if names.len() != states.len() {
            return Err(ProtocolError::LengthMismatch {
                names: names.len(),
                states: states.len(),
            });
        }
        Ok(Self { level, names, states })
    }

    /// Appends a player.
    pub fn add_player(&mut self, name: impl Into<String>, state: CarState) {
        self.names.push(name.into());
        self.states.push(state);
    }

    /// Level identifier.
    #[must_use]
    pub fn level(&self) -> &str {
        &self.level
    }

    /// Number of players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.names.len()
    }

    /// Name of player `index`.
    #[must_use]
    pub fn player_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Car of player `index`.
    #[must_use]
    pub fn car_state(&self, index: usize) -> Option<&CarState> {
        self.states.get(index)
    }

    /// `(name, state)` pairs in insertion order.
    pub fn players(&self) -> impl Iterator<Item = (&str, &CarState)> {
        self.names.iter().map(String::as_str).zip(self.states.iter())
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }

    pub(crate) fn states(&self) -> &[CarState] {
        &self.states
    }
}

/// Events under the `race:` prefix.
#[derive(Clone, Debug, PartialEq)]
pub enum RaceEvent {
    /// Full state of `name`'s car.
    CarStateChange {
        /// Driver.
        name: String,
        /// Kinematic snapshot.
        state: CarState,
    },
    /// Start the race.
    TriggerRaceStart,
}

impl RaceEvent {
    /// Wire name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CarStateChange { .. } => names::CAR_STATE_CHANGE,
            Self::TriggerRaceStart => names::TRIGGER_RACE_START,
        }
    }
}

/// Every protocol event.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Client identity.
    PlayerInfo {
        /// Requested display name.
        name: String,
        /// Client protocol version.
        protocol_version: u32,
    },
    /// Identity accepted.
    Welcome,
    /// Connection refused.
    Goodbye(GoodbyeReason),
    /// Player joined.
    PlayerConnected(String),
    /// Player left.
    PlayerDisconnected(String),
    /// Race on this level begins.
    InitRace(String),
    /// Full snapshot.
    GameState(GameState),
    /// Delegated to the race handler.
    Race(RaceEvent),
}

impl Event {
    /// Wire name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PlayerInfo { .. } => names::PLAYER_INFO,
            Self::Welcome => names::WELCOME,
            Self::Goodbye(_) => names::GOODBYE,
            Self::PlayerConnected(_) => names::PLAYER_CONNECTED,
            Self::PlayerDisconnected(_) => names::PLAYER_DISCONNECTED,
            Self::InitRace(_) => names::INIT_RACE,
            Self::GameState(_) => names::GAMESTATE,
            Self::Race(race) => race.name(),
        }
    }
}
