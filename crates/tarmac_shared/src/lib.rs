//! # TARMAC Shared
//!
//! Common types used by the race core, the client, and the server.
//!
//! ## RULE
//!
//! This crate must stay free of I/O and simulation state. Anything that owns
//! a socket belongs in `tarmac_networking`, anything that ticks belongs in
//! `tarmac_race`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;

pub use constants::{BLOCK_WIDTH, DEFAULT_PORT, FALLBACK_START_POSITION, MAX_FRAME_SIZE, PROTOCOL_VERSION, TICK_RATE};
pub use math::{Rect, Segment, Vec2};
