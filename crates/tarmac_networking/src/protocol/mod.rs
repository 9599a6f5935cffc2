//! # Race Protocol
//!
//! Named events with positional binary arguments, carried in
//! length-prefixed frames over TCP.
//!
//! ## Design
//!
//! - Decoding happens once at the boundary and yields a typed [`Event`]
//! - Unknown or malformed events are typed errors; callers log and drop
//! - Car state is always sent whole, never as a diff

mod events;
mod framing;
mod serialization;

pub use events::{names, Event, GameState, GoodbyeReason, RaceEvent, GENERAL_PREFIX, RACE_PREFIX};
pub use framing::{read_frame, write_frame, FRAME_HEADER_SIZE};
pub use serialization::{decode, encode, EventDeserializer, EventSerializer};
