//! # Race Client
//!
//! Client-side race handler. Owns the local [`Level`], keeps one car per
//! remote driver in step with the server's snapshots, and turns local input
//! changes into outgoing `race:car_state_change` events.

use std::collections::HashMap;

use tarmac_race::{Car, CarId, CarState, Level, LevelEvent, LevelLoader, RaceResult, START_HEADING};
use tarmac_shared::Vec2;
use tracing::{debug, info};

use crate::protocol::{GameState, RaceEvent};

/// Something the race handler wants the session to act on.
#[derive(Clone, Debug, PartialEq)]
pub enum RaceOutput {
    /// Send this event to the server.
    Send(RaceEvent),
    /// The local car finished a lap.
    LapCompleted(u32),
    /// Someone triggered the race start.
    RaceStartTriggered,
}

/// The client's race.
pub struct RaceClient {
    loader: Box<dyn LevelLoader + Send>,
    level: Level,
    level_id: Option<String>,
    local_name: String,
    local: Option<CarId>,
    remote: HashMap<String, CarId>,
}

impl RaceClient {
    /// Idle handler for the driver called `local_name`.
    #[must_use]
    pub fn new(local_name: impl Into<String>, loader: Box<dyn LevelLoader + Send>) -> Self {
        Self {
            loader,
            level: Level::new(),
            level_id: None,
            local_name: local_name.into(),
            local: None,
            remote: HashMap::new(),
        }
    }

    /// Loads `level_id` and places the local car on the first start position.
    ///
    /// A race already loaded is torn down first.
    ///
    /// # Errors
    ///
    /// Whatever the loader reports; the handler is left idle.
    pub fn init(&mut self, level_id: &str) -> RaceResult<()> {
        self.destroy();

        let data = self.loader.load(level_id)?;
        self.level.initialize_with(data);

        let start = self.level.start_position(1);
        self.local = Some(self.level.add_car(Car::new(start, START_HEADING)));
        self.level_id = Some(level_id.to_string());

        info!(target: "race", "racing on `{level_id}` as {}", self.local_name);
        Ok(())
    }

    /// Drops the level and every car.
    pub fn destroy(&mut self) {
        if self.level.is_loaded() {
            self.level.destroy();
        }
        self.level_id = None;
        self.local = None;
        self.remote.clear();
    }

    /// True while a level is loaded.
    #[inline]
    #[must_use]
    pub const fn is_racing(&self) -> bool {
        self.level_id.is_some()
    }

    /// Loaded level id.
    #[must_use]
    pub fn level_id(&self) -> Option<&str> {
        self.level_id.as_deref()
    }

    /// Name the local driver races under.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// The level, for drawing.
    #[must_use]
    pub const fn level(&self) -> &Level {
        &self.level
    }

    /// The local car.
    #[must_use]
    pub fn local_car(&self) -> Option<&Car> {
        self.local.and_then(|id| self.level.car(id))
    }

    /// The local car, for input setters.
    pub fn local_car_mut(&mut self) -> Option<&mut Car> {
        self.local.and_then(|id| self.level.car_mut(id))
    }

    /// Car driven by remote player `name`.
    #[must_use]
    pub fn remote_car(&self, name: &str) -> Option<&Car> {
        self.remote.get(name).and_then(|id| self.level.car(*id))
    }

    /// Number of remote cars.
    #[must_use]
    pub fn remote_count(&self) -> usize {
        self.remote.len()
    }

    /// Places every car listed in a server snapshot, including our own.
    pub fn apply_game_state(&mut self, state: &GameState) {
        if !self.is_racing() {
            debug!(target: "race", "gamestate before init_race, ignoring");
            return;
        }
        for (name, car_state) in state.players() {
            self.apply(name, car_state);
        }
    }

    /// Handles a delegated `race:` event.
    pub fn handle_event(&mut self, event: &RaceEvent) -> Option<RaceOutput> {
        match event {
            RaceEvent::CarStateChange { name, state } => {
                // our own state is authoritative locally
                if name != &self.local_name && self.is_racing() {
                    self.apply(name, state);
                }
                None
            }
            RaceEvent::TriggerRaceStart => {
                info!(target: "race", "race start triggered");
                Some(RaceOutput::RaceStartTriggered)
            }
        }
    }

    /// Removes a departed player's car.
    pub fn remove_player(&mut self, name: &str) {
        if let Some(id) = self.remote.remove(name) {
            self.level.remove_car(id);
        }
    }

    /// Advances the level one frame.
    pub fn update(&mut self, elapsed_ms: u32) -> Vec<RaceOutput> {
        if !self.is_racing() {
            return Vec::new();
        }

        let mut outputs = Vec::new();
        for event in self.level.update(elapsed_ms) {
            match event {
                LevelEvent::StatusChanged(id) if Some(id) == self.local => {
                    if let Some(car) = self.level.car(id) {
                        outputs.push(RaceOutput::Send(RaceEvent::CarStateChange {
                            name: self.local_name.clone(),
                            state: car.state(),
                        }));
                    }
                }
                LevelEvent::LapCompleted { car, lap } if Some(car) == self.local => {
                    info!(target: "race", "lap {lap} completed");
                    outputs.push(RaceOutput::LapCompleted(lap));
                }
                _ => {}
            }
        }
        outputs
    }

    fn apply(&mut self, name: &str, state: &CarState) {
        let id = if name == self.local_name {
            self.local
        } else {
            Some(match self.remote.get(name) {
                Some(id) => *id,
                None => {
                    let id = self
                        .level
                        .add_car(Car::new(Vec2::new(state.x, state.y), state.rotation));
                    self.remote.insert(name.to_string(), id);
                    id
                }
            })
        };

        if let Some(car) = id.and_then(|id| self.level.car_mut(id)) {
            car.apply_state(state);
        }
    }
}
