//! # Level Aggregate
//!
//! Owns the track grid, the walls, and every registered car of the active
//! level, and drives them once per frame. Other components refer to cars
//! by [`CarId`] only.

use std::path::Path;

use tarmac_shared::{Vec2, FALLBACK_START_POSITION};
use tracing::info;

use crate::block::BlockType;
use crate::bounds::{BoundaryId, BoundarySet};
use crate::car::Car;
use crate::checkpoint::{Checkpoint, CheckpointTracker};
use crate::error::RaceResult;
use crate::grid::TrackGrid;
use crate::level_file::LevelData;
use crate::pool::{SlotHandle, SlotPool};
#[cfg(feature = "client")]
use crate::stripes::{tyre_points, TyreStripes};

/// Handle to a car registered in a [`Level`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CarId(SlotHandle);

/// Something that happened during [`Level::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelEvent {
    /// The car's inputs changed; peers should hear about it.
    StatusChanged(CarId),
    /// The car finished a lap.
    LapCompleted {
        /// Car that crossed the line.
        car: CarId,
        /// Laps completed so far.
        lap: u32,
    },
    /// The car hit a wall and bounced.
    BoundCollision {
        /// Car that collided.
        car: CarId,
        /// Wall it hit.
        bound: BoundaryId,
    },
}

struct Entry {
    car: Car,
    /// Last tyre contact points while drifting.
    drift_points: [Option<Vec2>; 4],
}

/// The active level.
#[derive(Default)]
pub struct Level {
    loaded: bool,
    grid: Option<TrackGrid>,
    bounds: BoundarySet,
    start_positions: Vec<Vec2>,
    cars: SlotPool<Entry>,
    #[cfg(feature = "client")]
    stripes: TyreStripes,
}

impl Level {
    /// Creates an unloaded level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the level file at `path`.
    ///
    /// Nothing is kept if loading fails.
    ///
    /// # Errors
    ///
    /// Any [`crate::RaceError`] from reading or parsing the file.
    ///
    /// # Panics
    ///
    /// If the level is already loaded.
    pub fn initialize(&mut self, path: impl AsRef<Path>) -> RaceResult<()> {
        assert!(!self.loaded, "level is already loaded");
        let data = LevelData::from_file(path)?;
        self.initialize_with(data);
        Ok(())
    }

    /// Activates already-parsed level data.
    ///
    /// # Panics
    ///
    /// If the level is already loaded.
    pub fn initialize_with(&mut self, data: LevelData) {
        assert!(!self.loaded, "level is already loaded");

        info!(
            target: "race",
            "level loaded: {}x{} tiles, {} bounds, {} start positions",
            data.grid.width(),
            data.grid.height(),
            data.bounds.len(),
            data.start_positions.len()
        );

        self.grid = Some(data.grid);
        self.bounds = data.bounds;
        self.start_positions = data.start_positions;
        self.loaded = true;
    }

    /// Drops the grid, walls, cars and stripes.
    ///
    /// # Panics
    ///
    /// If the level is not loaded.
    pub fn destroy(&mut self) {
        assert!(self.loaded, "level is not loaded");

        self.grid = None;
        self.bounds.clear();
        self.start_positions.clear();
        self.cars.clear();
        #[cfg(feature = "client")]
        self.stripes.clear();
        self.loaded = false;
    }

    /// Whether a level is active.
    #[inline]
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Track grid of the active level.
    #[must_use]
    pub const fn grid(&self) -> Option<&TrackGrid> {
        self.grid.as_ref()
    }

    /// Walls of the active level.
    #[must_use]
    pub const fn bounds(&self) -> &BoundarySet {
        &self.bounds
    }

    /// Ground drag at a world position; zero off the grid.
    #[must_use]
    pub fn resistance(&self, x: f32, y: f32) -> f32 {
        debug_assert!(self.loaded, "level is not loaded");
        self.grid.as_ref().map_or(0.0, |grid| grid.resistance(x, y))
    }

    /// Start position `num`, counting from 1. Missing slots use a fixed fallback.
    #[must_use]
    pub fn start_position(&self, num: usize) -> Vec2 {
        num.checked_sub(1)
            .and_then(|i| self.start_positions.get(i))
            .copied()
            .unwrap_or(Vec2::new(FALLBACK_START_POSITION.0, FALLBACK_START_POSITION.1))
    }

    // ------------------------------------------------------------------- cars

    /// Registers a car and gives it this level's checkpoints.
    ///
    /// # Panics
    ///
    /// If the level is not loaded.
    pub fn add_car(&mut self, car: Car) -> CarId {
        assert!(self.loaded, "level is not loaded");

        let tracker = self.build_checkpoints();
        let handle = self.cars.insert(Entry {
            car: car.with_checkpoints(tracker),
            drift_points: [None; 4],
        });
        CarId(handle)
    }

    /// Unregisters a car and hands it back.
    pub fn remove_car(&mut self, id: CarId) -> Option<Car> {
        self.cars.remove(id.0).map(|entry| entry.car)
    }

    /// Registered car by id.
    #[must_use]
    pub fn car(&self, id: CarId) -> Option<&Car> {
        self.cars.get(id.0).map(|entry| &entry.car)
    }

    /// Registered car by id, for input setters and remote state.
    pub fn car_mut(&mut self, id: CarId) -> Option<&mut Car> {
        self.cars.get_mut(id.0).map(|entry| &mut entry.car)
    }

    /// All registered cars.
    pub fn cars(&self) -> impl Iterator<Item = (CarId, &Car)> {
        self.cars.iter().map(|(handle, entry)| (CarId(handle), &entry.car))
    }

    /// Number of registered cars.
    #[must_use]
    pub fn car_count(&self) -> usize {
        self.cars.len()
    }

    /// Skid marks left so far.
    #[cfg(feature = "client")]
    #[must_use]
    pub const fn tyre_stripes(&self) -> &TyreStripes {
        &self.stripes
    }

    /// Street tiles become checkpoints; the tile above the start line is the lap line.
    fn build_checkpoints(&self) -> CheckpointTracker {
        let Some(grid) = &self.grid else {
            return CheckpointTracker::default();
        };

        let mut checkpoints = Vec::new();
        let mut lap_checkpoint = None;

        for (x, y, block) in grid.blocks() {
            let (x, y) = (i64::from(x), i64::from(y));
            if block.is_street() {
                checkpoints.push(Checkpoint::new(grid.tile_rect(x, y)));
            }
            if block == BlockType::StartLine {
                lap_checkpoint = Some(Checkpoint::new(grid.tile_rect(x, y - 1)));
            }
        }

        CheckpointTracker::new(checkpoints, lap_checkpoint)
    }

    // ----------------------------------------------------------------- ticking

    /// Advances every car by `elapsed_ms` and applies level-wide effects.
    pub fn update(&mut self, elapsed_ms: u32) -> Vec<LevelEvent> {
        let mut events = Vec::new();
        let Some(grid) = &self.grid else {
            return events;
        };

        for (handle, entry) in self.cars.iter_mut() {
            let id = CarId(handle);
            let report = entry.car.update(elapsed_ms, grid);

            if report.status_changed {
                events.push(LevelEvent::StatusChanged(id));
            }
            if report.lap_completed {
                let lap = entry.car.lap();
                info!(target: "race", "car {} completed lap {lap}", handle.index());
                events.push(LevelEvent::LapCompleted { car: id, lap });
            }
        }

        #[cfg(feature = "client")]
        {
            self.check_collisions(&mut events);
            self.update_tyre_stripes();
        }

        events
    }

    /// Bounces every car off the first wall its outline touches.
    #[cfg(feature = "client")]
    fn check_collisions(&mut self, events: &mut Vec<LevelEvent>) {
        for (handle, entry) in self.cars.iter_mut() {
            let outline = entry.car.outline();
            let Some(bound_id) = self.bounds.hits(&outline).next() else {
                continue;
            };
            if let Some(bound) = self.bounds.get(bound_id) {
                tracing::debug!(target: "race", "car {} hit bound {}", handle.index(), bound_id.0);
                entry.car.perform_bound_collision(bound);
                events.push(LevelEvent::BoundCollision {
                    car: CarId(handle),
                    bound: bound_id,
                });
            }
        }
    }

    #[cfg(feature = "client")]
    fn update_tyre_stripes(&mut self) {
        for (handle, entry) in self.cars.iter_mut() {
            if !entry.car.is_drifting() {
                entry.drift_points = [None; 4];
                continue;
            }

            let points = tyre_points(entry.car.position(), entry.car.rotation());
            for (last, point) in entry.drift_points.iter_mut().zip(points) {
                if let Some(start) = *last {
                    self.stripes.add(start, point, CarId(handle));
                }
                *last = Some(point);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::CarState;

    const TRACK: &str = r#"
        [meta]
        block_width = 100

        [meta.size]
        width = 1
        height = 3

        [[content.track.block]]
        x = 0
        y = 0
        type = "vert"

        [[content.track.block]]
        x = 0
        y = 1
        type = "vert"

        [[content.track.block]]
        x = 0
        y = 2
        type = "start_line"

        [[content.start_positions.position]]
        x = 0.5
        y = 2.5

        [[content.start_positions.position]]
        x = 0.5
        y = 1.5
    "#;

    fn level() -> Level {
        let mut level = Level::new();
        level.initialize_with(LevelData::parse(TRACK).unwrap());
        level
    }

    #[test]
    fn test_start_positions_are_one_based() {
        let level = level();
        assert_eq!(level.start_position(1), Vec2::new(50.0, 250.0));
        assert_eq!(level.start_position(2), Vec2::new(50.0, 150.0));
        assert_eq!(level.start_position(3), Vec2::new(200.0, 200.0));
        assert_eq!(level.start_position(0), Vec2::new(200.0, 200.0));
    }

    #[test]
    fn test_add_car_builds_checkpoints() {
        let mut level = level();
        let id = level.add_car(Car::new(level.start_position(1), 270.0));

        let tracker = level.car(id).unwrap().checkpoints();
        assert_eq!(tracker.checkpoints().len(), 3);
        // lap line is the tile above the start line
        let lap = tracker.lap_checkpoint().unwrap();
        assert_eq!(lap.rect().min, Vec2::new(0.0, 100.0));
    }

    #[test]
    fn test_remove_car_invalidates_id() {
        let mut level = level();
        let id = level.add_car(Car::default());
        assert!(level.remove_car(id).is_some());
        assert!(level.car(id).is_none());
        assert!(level.remove_car(id).is_none());
        assert_eq!(level.car_count(), 0);
    }

    #[test]
    fn test_update_reports_status_change() {
        let mut level = level();
        let id = level.add_car(Car::new(level.start_position(1), 270.0));
        assert!(level.update(16).is_empty());

        level.car_mut(id).unwrap().set_acceleration(true);
        let events = level.update(16);
        assert_eq!(events, vec![LevelEvent::StatusChanged(id)]);
        assert!(level.update(16).is_empty());
    }

    #[test]
    fn test_destroy_clears_everything() {
        let mut level = level();
        let id = level.add_car(Car::default());
        level.destroy();

        assert!(!level.is_loaded());
        assert!(level.car(id).is_none());
        assert!(level.grid().is_none());

        // can be loaded again
        level.initialize_with(LevelData::parse(TRACK).unwrap());
        assert!(level.is_loaded());
    }

    #[test]
    #[should_panic(expected = "level is already loaded")]
    fn test_double_initialize_panics() {
        let mut level = level();
        level.initialize_with(LevelData::parse(TRACK).unwrap());
    }

    #[test]
    #[should_panic(expected = "level is not loaded")]
    fn test_destroy_unloaded_panics() {
        Level::new().destroy();
    }

    #[test]
    fn test_failed_load_leaves_level_unloaded() {
        let mut level = Level::new();
        assert!(level.initialize("/definitely/not/a/level.toml").is_err());
        assert!(!level.is_loaded());
    }

    #[cfg(feature = "client")]
    #[test]
    fn test_wall_collision_bounces_car() {
        let source = format!("{TRACK}\n[[content.bounds.bound]]\nx1 = 0.0\ny1 = 2.2\nx2 = 1.0\ny2 = 2.2\n");
        let mut level = Level::new();
        level.initialize_with(LevelData::parse(&source).unwrap());

        // heading up, 20 units below the wall, front edge 20 ahead
        let id = level.add_car(Car::new(Vec2::new(50.0, 241.0), 270.0));
        level.car_mut(id).unwrap().apply_state(&CarState {
            x: 50.0,
            y: 241.0,
            rotation: 270.0,
            speed: 100.0,
            ..CarState::default()
        });

        let events = level.update(16);
        assert!(events.iter().any(|e| matches!(e, LevelEvent::BoundCollision { car, .. } if *car == id)));

        let car = level.car(id).unwrap();
        assert_eq!(car.position(), Vec2::new(50.0, 241.0));
        assert!(car.speed() < 0.0);
    }

    #[cfg(feature = "client")]
    #[test]
    fn test_stripes_start_on_second_drifting_tick() {
        let mut level = level();
        let id = level.add_car(Car::new(Vec2::new(50.0, 150.0), 270.0));
        let car = level.car_mut(id).unwrap();
        car.apply_state(&CarState {
            x: 50.0,
            y: 150.0,
            rotation: 270.0,
            speed: 500.0,
            ..CarState::default()
        });
        car.set_turn(1.0);

        let _ = level.update(1);
        assert!(level.car(id).unwrap().is_drifting());
        assert!(level.tyre_stripes().is_empty());

        let _ = level.update(1);
        assert_eq!(level.tyre_stripes().len(), 4);

        // straightening out resets the samples
        level.car_mut(id).unwrap().set_turn(0.0);
        let _ = level.update(1);
        level.car_mut(id).unwrap().set_turn(1.0);
        let _ = level.update(1);
        assert_eq!(level.tyre_stripes().len(), 4);
    }
}
