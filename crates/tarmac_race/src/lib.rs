//! # TARMAC Race
//!
//! The simulation half of the racing core: track, walls, laps and cars.
//!
//! ## Design Principles
//!
//! 1. **Pure ticks** - `Level::update` is a function of state, inputs and elapsed time
//! 2. **Handles, not references** - cars are owned by the level and addressed by [`CarId`]
//! 3. **Edge-triggered sync** - a car reports an input change once, peers get one update
//! 4. **External levels** - track layout lives in TOML files
//!
//! ## Thread Safety
//!
//! A [`Level`] belongs to the thread running the frame loop. Network events
//! are marshalled onto that thread before they touch any car.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tarmac_race::{Car, Level};
//!
//! let mut level = Level::new();
//! level.initialize("levels/oval.toml")?;
//!
//! let me = level.add_car(Car::new(level.start_position(1), 270.0));
//! level.car_mut(me).unwrap().set_acceleration(true);
//!
//! for event in level.update(16) {
//!     // forward status changes to the server
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod block;
pub mod bounds;
pub mod car;
pub mod checkpoint;
pub mod error;
pub mod grid;
pub mod level;
pub mod level_file;
pub mod pool;
#[cfg(feature = "client")]
pub mod stripes;

pub use block::{BlockType, Rotation};
pub use bounds::{Boundary, BoundaryId, BoundarySet};
pub use car::{Car, CarState, CarTelemetry, TickReport, START_HEADING};
pub use checkpoint::{Checkpoint, CheckpointTracker};
pub use error::{RaceError, RaceResult};
pub use grid::{GroundResistance, NoGround, TrackGrid};
pub use level::{CarId, Level, LevelEvent};
pub use level_file::{DirectoryLoader, LevelData, LevelLoader};
#[cfg(feature = "client")]
pub use stripes::{TyreStripe, TyreStripes};
