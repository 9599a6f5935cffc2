//! # Race Error Types
//!
//! Everything that can go wrong while loading a level.
//! Simulation itself never fails.

use thiserror::Error;

/// Errors that can occur in the race core.
#[derive(Error, Debug)]
pub enum RaceError {
    /// Reading the level file failed.
    #[error("level file unreadable: {0}")]
    Io(#[from] std::io::Error),

    /// The level document is not valid TOML or misses a required value.
    #[error("malformed level: {0}")]
    Parse(String),

    /// A tile was placed outside the declared grid.
    #[error("block coords out of bounds: ({x}, {y}) on a {width}x{height} grid")]
    BlockOutOfBounds {
        /// Tile column.
        x: i64,
        /// Tile row.
        y: i64,
        /// Grid width in tiles.
        width: u32,
        /// Grid height in tiles.
        height: u32,
    },

    /// Grid size or block width is out of range.
    #[error("invalid level size: {0}")]
    InvalidSize(String),

    /// No level with this identifier could be found.
    #[error("unknown level: {0}")]
    UnknownLevel(String),
}

impl From<toml::de::Error> for RaceError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type for race operations.
pub type RaceResult<T> = Result<T, RaceError>;
