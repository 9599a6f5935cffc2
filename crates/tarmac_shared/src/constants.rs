//! # Game & Network Constants
//!
//! Values both peers must agree on. Changing any of the protocol values
//! requires bumping [`PROTOCOL_VERSION`].

// =============================================================================
// TRACK GEOMETRY
// =============================================================================

/// Edge length of one track block in world units.
///
/// Level files express positions in block units; loaders multiply by this.
pub const BLOCK_WIDTH: f32 = 200.0;

/// Fallback start position used when a level declares fewer positions than
/// the requested slot.
pub const FALLBACK_START_POSITION: (f32, f32) = (200.0, 200.0);

// =============================================================================
// NETWORK CONFIGURATION
// =============================================================================

/// Protocol version sent in the handshake. Peers with a different value are
/// turned away with a goodbye.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default TCP port for the race server.
pub const DEFAULT_PORT: u16 = 2500;

/// Default bind address for the race server.
pub const DEFAULT_BIND: &str = "0.0.0.0:2500";

/// Server loop rate (updates per second).
pub const TICK_RATE: u32 = 60;

/// Maximum clients per server.
pub const MAX_CLIENTS: usize = 32;

/// Largest accepted frame payload in bytes.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;
