//! # Race Server
//!
//! Server-side race state: which level is running and the last known car
//! of every racer. Exists alongside the session; only acts while a race is
//! initialized.

use std::collections::BTreeMap;

use tarmac_race::{Car, CarState, Level, LevelData, START_HEADING};
use tracing::{debug, info, warn};

use super::ConnectionId;
use crate::protocol::{GameState, RaceEvent};

/// A player taking part in the current race.
#[derive(Clone, Debug, PartialEq)]
pub struct RacePlayer {
    name: String,
    slot: usize,
    state: CarState,
}

impl RacePlayer {
    /// Driver name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start position the car was placed on, 1-based.
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Last car state the driver reported.
    #[must_use]
    pub const fn state(&self) -> &CarState {
        &self.state
    }
}

/// What the session should do with a race event after handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relay {
    /// Keep it on the server.
    Drop,
    /// Forward verbatim to every other identified connection.
    Others,
}

/// Race state of the relay server.
#[derive(Default)]
pub struct RaceServer {
    level_id: Option<String>,
    level: Level,
    players: BTreeMap<ConnectionId, RacePlayer>,
    relay_race_start: bool,
}

impl RaceServer {
    /// Idle race state.
    #[must_use]
    pub fn new(relay_race_start: bool) -> Self {
        Self {
            relay_race_start,
            ..Self::default()
        }
    }

    /// True between [`RaceServer::initialize`] and [`RaceServer::destroy`].
    #[inline]
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.level_id.is_some()
    }

    /// Running level.
    #[must_use]
    pub fn level_id(&self) -> Option<&str> {
        self.level_id.as_deref()
    }

    /// Starts a race on `level_id` with every given player.
    ///
    /// # Panics
    ///
    /// If a race is already initialized.
    pub fn initialize<'a>(
        &mut self,
        level_id: &str,
        data: LevelData,
        players: impl IntoIterator<Item = (ConnectionId, &'a str)>,
    ) {
        assert!(!self.is_initialized(), "race is already initialized");

        self.level.initialize_with(data);
        self.level_id = Some(level_id.to_string());
        for (id, name) in players {
            self.add_player(id, name);
        }

        info!(target: "race", "race initialized on `{level_id}` with {} players", self.players.len());
    }

    /// Ends the race and forgets every racer.
    ///
    /// # Panics
    ///
    /// If no race is initialized.
    pub fn destroy(&mut self) {
        assert!(self.is_initialized(), "race is not initialized");

        self.players.clear();
        self.level.destroy();
        self.level_id = None;
        info!(target: "race", "race destroyed");
    }

    /// Gives a joining player a car on the lowest free start position.
    ///
    /// Returns `None` while no race is initialized.
    pub fn add_player(&mut self, id: ConnectionId, name: &str) -> Option<&RacePlayer> {
        if !self.is_initialized() {
            return None;
        }

        let slot = self.free_slot();
        let car = Car::new(self.level.start_position(slot), START_HEADING);
        let player = RacePlayer {
            name: name.to_string(),
            slot,
            state: car.state(),
        };
        debug!(target: "race", "{name} takes start position {slot}");

        self.players.insert(id, player);
        self.players.get(&id)
    }

    /// Drops a leaving player's car.
    pub fn remove_player(&mut self, id: ConnectionId) -> Option<RacePlayer> {
        if !self.is_initialized() {
            return None;
        }
        self.players.remove(&id)
    }

    /// Racer behind `id`.
    #[must_use]
    pub fn player(&self, id: ConnectionId) -> Option<&RacePlayer> {
        self.players.get(&id)
    }

    /// Number of racers.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Snapshot of every racer in connection order.
    #[must_use]
    pub fn game_state(&self) -> Option<GameState> {
        let level = self.level_id.as_deref()?;
        let mut state = GameState::new(level);
        for player in self.players.values() {
            state.add_player(player.name.clone(), player.state);
        }
        Some(state)
    }

    fn free_slot(&self) -> usize {
        (1..).find(|slot| self.players.values().all(|p| p.slot != *slot)).unwrap_or(1)
    }

    /// Applies a race event from `from`.
    ///
    /// Events before initialization, events from connections without a
    /// car, and car states naming another driver are dropped.
    pub fn handle(&mut self, from: ConnectionId, event: &RaceEvent) -> Relay {
        if !self.is_initialized() {
            debug!(target: "race", "ignoring {} from {from}: no race", event.name());
            return Relay::Drop;
        }
        let Some(player) = self.players.get_mut(&from) else {
            debug!(target: "race", "ignoring {} from {from}: not racing", event.name());
            return Relay::Drop;
        };

        match event {
            RaceEvent::CarStateChange { name, state } => {
                if *name != player.name {
                    warn!(target: "race", "{from} sent a car state for `{name}` as `{}`", player.name);
                    return Relay::Drop;
                }
                player.state = *state;
                Relay::Others
            }
            RaceEvent::TriggerRaceStart => {
                info!(target: "race", "{} triggered race start", player.name);
                if self.relay_race_start {
                    Relay::Others
                } else {
                    Relay::Drop
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OVAL: &str = r#"
        [meta.size]
        width = 3
        height = 3

        [[content.track.block]]
        x = 1
        y = 2
        type = "start_line"

        [[content.start_positions.position]]
        x = 1.5
        y = 2.5

        [[content.start_positions.position]]
        x = 1.5
        y = 1.5
    "#;

    const NOBODY: [(ConnectionId, &str); 0] = [];

    fn oval() -> LevelData {
        LevelData::parse(OVAL).unwrap()
    }

    fn state_at(x: f32) -> CarState {
        CarState {
            x,
            ..CarState::default()
        }
    }

    #[test]
    fn test_players_take_consecutive_start_positions() {
        let mut race = RaceServer::new(false);
        race.initialize("oval", oval(), [(ConnectionId(4), "a"), (ConnectionId(9), "b"), (ConnectionId(11), "c")]);

        assert!(race.is_initialized());
        assert_eq!(race.level_id(), Some("oval"));
        assert_eq!(race.player(ConnectionId(4)).map(|p| (p.state().x, p.state().y)), Some((300.0, 500.0)));
        assert_eq!(race.player(ConnectionId(9)).map(|p| (p.state().x, p.state().y)), Some((300.0, 300.0)));
        // out of configured positions
        assert_eq!(race.player(ConnectionId(11)).map(|p| (p.state().x, p.state().y)), Some((200.0, 200.0)));
        assert_eq!(race.player(ConnectionId(4)).map(|p| p.state().rotation), Some(START_HEADING));
    }

    #[test]
    fn test_events_before_initialize_are_ignored() {
        let mut race = RaceServer::new(true);
        let event = RaceEvent::CarStateChange {
            name: "a".into(),
            state: state_at(1.0),
        };

        assert_eq!(race.handle(ConnectionId(1), &event), Relay::Drop);
        assert_eq!(race.handle(ConnectionId(1), &RaceEvent::TriggerRaceStart), Relay::Drop);
        assert!(race.add_player(ConnectionId(1), "a").is_none());
        assert!(race.game_state().is_none());
    }

    #[test]
    fn test_car_state_change_is_stored_and_relayed() {
        let mut race = RaceServer::new(false);
        race.initialize("oval", oval(), [(ConnectionId(1), "a"), (ConnectionId(2), "b")]);

        let event = RaceEvent::CarStateChange {
            name: "a".into(),
            state: state_at(42.0),
        };
        assert_eq!(race.handle(ConnectionId(1), &event), Relay::Others);

        let snapshot = race.game_state().unwrap();
        assert_eq!(snapshot.player_name(0), Some("a"));
        assert_eq!(snapshot.car_state(0).map(|s| s.x), Some(42.0));
        assert_eq!(snapshot.player_name(1), Some("b"));

        // unknown sender
        assert_eq!(race.handle(ConnectionId(7), &event), Relay::Drop);
    }

    #[test]
    fn test_car_state_for_another_driver_is_dropped() {
        let mut race = RaceServer::new(false);
        race.initialize("oval", oval(), [(ConnectionId(1), "alice"), (ConnectionId(2), "bob")]);

        let spoof = RaceEvent::CarStateChange {
            name: "bob".into(),
            state: state_at(999.0),
        };
        assert_eq!(race.handle(ConnectionId(1), &spoof), Relay::Drop);

        assert_eq!(race.player(ConnectionId(1)).map(|p| p.state().x), Some(300.0));
        assert_eq!(race.player(ConnectionId(2)).map(|p| p.state().x), Some(300.0));
    }

    #[test]
    fn test_late_joiner_reuses_vacated_start_position() {
        let mut race = RaceServer::new(false);
        race.initialize("oval", oval(), [(ConnectionId(1), "a"), (ConnectionId(2), "b")]);
        race.remove_player(ConnectionId(1));

        let c = race.add_player(ConnectionId(3), "c").map(|p| (p.slot(), p.state().x, p.state().y));
        assert_eq!(c, Some((1, 300.0, 500.0)));

        let b = race.player(ConnectionId(2)).map(|p| (p.slot(), p.state().x, p.state().y));
        assert_eq!(b, Some((2, 300.0, 300.0)));

        // both configured positions are taken now
        let d = race.add_player(ConnectionId(4), "d").map(|p| (p.slot(), p.state().x, p.state().y));
        assert_eq!(d, Some((3, 200.0, 200.0)));
    }

    #[test]
    fn test_race_start_relay_is_configurable() {
        let mut quiet = RaceServer::new(false);
        quiet.initialize("oval", oval(), [(ConnectionId(1), "a")]);
        assert_eq!(quiet.handle(ConnectionId(1), &RaceEvent::TriggerRaceStart), Relay::Drop);

        let mut loud = RaceServer::new(true);
        loud.initialize("oval", oval(), [(ConnectionId(1), "a")]);
        assert_eq!(loud.handle(ConnectionId(1), &RaceEvent::TriggerRaceStart), Relay::Others);
    }

    #[test]
    fn test_destroy_allows_reinitialize() {
        let mut race = RaceServer::new(false);
        race.initialize("oval", oval(), [(ConnectionId(1), "a")]);
        race.destroy();

        assert!(!race.is_initialized());
        assert_eq!(race.player_count(), 0);

        race.initialize("oval", oval(), NOBODY);
        assert!(race.add_player(ConnectionId(2), "late").is_some());
        assert_eq!(race.remove_player(ConnectionId(2)).map(|p| p.name), Some("late".to_string()));
    }

    #[test]
    #[should_panic(expected = "race is already initialized")]
    fn test_double_initialize_panics() {
        let mut race = RaceServer::new(false);
        race.initialize("oval", oval(), NOBODY);
        race.initialize("oval", oval(), NOBODY);
    }

    #[test]
    #[should_panic(expected = "race is not initialized")]
    fn test_destroy_without_initialize_panics() {
        RaceServer::new(false).destroy();
    }
}
