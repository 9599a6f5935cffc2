//! # Configuration
//!
//! Server and client settings, loaded from TOML. Every field has a default,
//! so an empty file is a valid configuration.
//!
//! ```toml
//! bind_address = "0.0.0.0:2500"
//! max_clients = 16
//! tick_rate = 60
//! level_dir = "levels"
//! level = "oval"
//! relay_race_start = false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tarmac_shared::constants::{DEFAULT_BIND, MAX_CLIENTS};
use tarmac_shared::{DEFAULT_PORT, TICK_RATE};

use crate::error::NetResult;

/// Relay server settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds.
    pub bind_address: String,
    /// Connections beyond this are closed on accept.
    pub max_clients: usize,
    /// Server loop rate in Hz.
    pub tick_rate: u32,
    /// Directory holding `<level>.toml` files.
    pub level_dir: PathBuf,
    /// Level to start a race on at boot.
    pub level: Option<String>,
    /// Forward `race:trigger_race_start` to the other players.
    pub relay_race_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND.to_string(),
            max_clients: MAX_CLIENTS,
            tick_rate: TICK_RATE,
            level_dir: PathBuf::from("levels"),
            level: None,
            relay_race_start: false,
        }
    }
}

impl ServerConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// [`crate::NetError::Config`] on syntax or type errors.
    pub fn from_toml_str(source: &str) -> NetResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// I/O errors, or as [`ServerConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> NetResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

/// Player settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `host:port` of the relay server.
    pub server_addr: String,
    /// Display name sent in the handshake.
    pub player_name: String,
    /// Directory holding `<level>.toml` files.
    pub level_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            player_name: "Player".to_string(),
            level_dir: PathBuf::from("levels"),
        }
    }
}

impl ClientConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// [`crate::NetError::Config`] on syntax or type errors.
    pub fn from_toml_str(source: &str) -> NetResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// I/O errors, or as [`ClientConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> NetResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}
