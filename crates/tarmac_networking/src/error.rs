//! # Networking Error Types

use tarmac_race::RaceError;
use thiserror::Error;

/// A frame or event payload that cannot be decoded or encoded.
///
/// Receivers log these and drop the event; the session carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Event name not in the dispatch table.
    #[error("unhandled event: {0}")]
    UnknownEvent(String),

    /// Payload ended before all arguments were read.
    #[error("event payload truncated")]
    Truncated,

    /// Bytes left over after the last argument.
    #[error("{0} trailing bytes after event")]
    TrailingBytes(usize),

    /// A string argument is not UTF-8.
    #[error("string argument is not valid UTF-8")]
    InvalidUtf8,

    /// Game state name and car arrays differ in length.
    #[error("gamestate has {names} names but {states} car states")]
    LengthMismatch {
        /// Number of player names.
        names: usize,
        /// Number of car states.
        states: usize,
    },

    /// Goodbye reason code not known to this build.
    #[error("unknown goodbye reason {0}")]
    InvalidGoodbyeReason(u8),

    /// An argument is too long for its length prefix.
    #[error("argument too long to encode")]
    Overflow,

    /// Frame exceeds the size limit.
    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),
}

/// Result type for codec operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors surfaced by sessions, transport and configuration.
#[derive(Error, Debug)]
pub enum NetError {
    /// The synchronous connect call failed.
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        /// Address that was dialled.
        addr: String,
        /// Underlying socket error.
        source: std::io::Error,
    },

    /// Socket or file error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Level could not be loaded.
    #[error("race error: {0}")]
    Race(#[from] RaceError),

    /// Configuration file is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Operation needs a live connection.
    #[error("not connected")]
    NotConnected,

    /// The transport thread has gone away.
    #[error("transport channel closed")]
    ChannelClosed,
}

impl From<toml::de::Error> for NetError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for networking operations.
pub type NetResult<T> = Result<T, NetError>;
