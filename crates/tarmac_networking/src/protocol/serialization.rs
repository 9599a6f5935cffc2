//! # Event Serialization
//!
//! An event on the wire is its name followed by its arguments in a fixed
//! order:
//!
//! ```text
//! [name: str] [arg 0] [arg 1] ...
//! ```
//!
//! - `str` is a `u16` little-endian byte length followed by UTF-8 bytes
//! - integers and floats are little-endian
//! - a car state is its 32-byte plain-old-data image
//!
//! | Event                      | Arguments                                   |
//! |----------------------------|---------------------------------------------|
//! | `general:player_info`      | name: str, protocol_version: u32            |
//! | `general:welcome`          | -                                           |
//! | `general:goodbye`          | reason: u8                                  |
//! | `general:player_connected` | name: str                                   |
//! | `general:player_disconnected` | name: str                                |
//! | `general:init_race`        | level: str                                  |
//! | `general:gamestate`        | level: str, n: u16, n x str, m: u16, m x car|
//! | `race:car_state_change`    | name: str, state: car                       |
//! | `race:trigger_race_start`  | -                                           |

use bytemuck::{bytes_of, Pod};
use tarmac_race::CarState;
use tarmac_shared::MAX_FRAME_SIZE;

use super::events::{names, Event, GameState, GoodbyeReason, RaceEvent, GENERAL_PREFIX, RACE_PREFIX};
use crate::error::{ProtocolError, ProtocolResult};

/// Event serializer - writes into a reusable buffer.
///
/// Keep one per session and call [`EventSerializer::serialize`] for each
/// outgoing event.
#[derive(Debug, Default)]
pub struct EventSerializer {
    buffer: Vec<u8>,
}

impl EventSerializer {
    /// Creates a new serializer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
        }
    }

    /// Resets the serializer for reuse.
    #[inline]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns a slice of the written data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Overflow`] for strings over 65535 bytes.
    pub fn write_str(&mut self, value: &str) -> ProtocolResult<()> {
        self.write_u16(len_u16(value.len())?);
        self.buffer.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Writes a Pod type directly.
    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) {
        self.buffer.extend_from_slice(bytes_of(value));
    }

    /// Serializes a complete event, replacing previous contents.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Overflow`] for oversized arguments and
    /// [`ProtocolError::FrameTooLarge`] if the event exceeds a frame.
    pub fn serialize(&mut self, event: &Event) -> ProtocolResult<&[u8]> {
        self.reset();
        self.write_str(event.name())?;

        match event {
            Event::PlayerInfo { name, protocol_version } => {
                self.write_str(name)?;
                self.write_u32(*protocol_version);
            }
            Event::Welcome => {}
            Event::Goodbye(reason) => self.write_u8(*reason as u8),
            Event::PlayerConnected(name) | Event::PlayerDisconnected(name) => self.write_str(name)?,
            Event::InitRace(level) => self.write_str(level)?,
            Event::GameState(state) => self.write_game_state(state)?,
            Event::Race(RaceEvent::CarStateChange { name, state }) => {
                self.write_str(name)?;
                self.write_pod(state);
            }
            Event::Race(RaceEvent::TriggerRaceStart) => {}
        }

        if self.buffer.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge(self.buffer.len()));
        }
        Ok(self.buffer.as_slice())
    }

    fn write_game_state(&mut self, state: &GameState) -> ProtocolResult<()> {
        self.write_str(state.level())?;

        self.write_u16(len_u16(state.names().len())?);
        for name in state.names() {
            self.write_str(name)?;
        }

        self.write_u16(len_u16(state.states().len())?);
        for car in state.states() {
            self.write_pod(car);
        }
        Ok(())
    }
}

fn len_u16(len: usize) -> ProtocolResult<u16> {
    u16::try_from(len).map_err(|_| ProtocolError::Overflow)
}

/// Encodes one event into a fresh buffer.
///
/// # Errors
///
/// As [`EventSerializer::serialize`].
pub fn encode(event: &Event) -> ProtocolResult<Vec<u8>> {
    let mut serializer = EventSerializer::new();
    serializer.serialize(event).map(<[u8]>::to_vec)
}

/// Decodes one event.
///
/// # Errors
///
/// [`ProtocolError::UnknownEvent`] for names outside the table, and the
/// other variants for malformed arguments.
pub fn decode(data: &[u8]) -> ProtocolResult<Event> {
    EventDeserializer::new(data).deserialize()
}

/// Event deserializer - reads an event from a buffer.
pub struct EventDeserializer<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> EventDeserializer<'a> {
    /// Creates a new deserializer from a buffer.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    fn take(&mut self, len: usize) -> ProtocolResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(ProtocolError::Truncated);
        }
        let slice = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a u16 in little-endian format.
    #[inline]
    pub fn read_u16(&mut self) -> ProtocolResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a u32 in little-endian format.
    #[inline]
    pub fn read_u32(&mut self) -> ProtocolResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> ProtocolResult<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Reads a Pod type directly.
    #[inline]
    pub fn read_pod<T: Pod>(&mut self) -> ProtocolResult<T> {
        let slice = self.take(std::mem::size_of::<T>())?;
        bytemuck::try_pod_read_unaligned(slice).map_err(|_| ProtocolError::Truncated)
    }

    /// Deserializes one event and checks nothing is left over.
    pub fn deserialize(&mut self) -> ProtocolResult<Event> {
        let name = self.read_str()?;

        let event = if name.starts_with(GENERAL_PREFIX) {
            self.read_general(&name)?
        } else if name.starts_with(RACE_PREFIX) {
            Event::Race(self.read_race(&name)?)
        } else {
            return Err(ProtocolError::UnknownEvent(name));
        };

        match self.remaining() {
            0 => Ok(event),
            extra => Err(ProtocolError::TrailingBytes(extra)),
        }
    }

    fn read_general(&mut self, name: &str) -> ProtocolResult<Event> {
        Ok(match name {
            names::PLAYER_INFO => Event::PlayerInfo {
                name: self.read_str()?,
                protocol_version: self.read_u32()?,
            },
            names::WELCOME => Event::Welcome,
            names::GOODBYE => Event::Goodbye(GoodbyeReason::try_from(self.read_u8()?)?),
            names::PLAYER_CONNECTED => Event::PlayerConnected(self.read_str()?),
            names::PLAYER_DISCONNECTED => Event::PlayerDisconnected(self.read_str()?),
            names::INIT_RACE => Event::InitRace(self.read_str()?),
            names::GAMESTATE => Event::GameState(self.read_game_state()?),
            _ => return Err(ProtocolError::UnknownEvent(name.to_owned())),
        })
    }

    fn read_race(&mut self, name: &str) -> ProtocolResult<RaceEvent> {
        Ok(match name {
            names::CAR_STATE_CHANGE => RaceEvent::CarStateChange {
                name: self.read_str()?,
                state: self.read_pod::<CarState>()?,
            },
            names::TRIGGER_RACE_START => RaceEvent::TriggerRaceStart,
            _ => return Err(ProtocolError::UnknownEvent(name.to_owned())),
        })
    }

    fn read_game_state(&mut self) -> ProtocolResult<GameState> {
        let level = self.read_str()?;

        let name_count = self.read_u16()? as usize;
        let mut players = Vec::with_capacity(name_count.min(self.remaining() / 2));
        for _ in 0..name_count {
            players.push(self.read_str()?);
        }

        let state_count = self.read_u16()? as usize;
        let mut states = Vec::with_capacity(state_count.min(self.remaining() / CarState::SIZE));
        for _ in 0..state_count {
            states.push(self.read_pod::<CarState>()?);
        }

        GameState::from_parts(level, players, states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> CarState {
        CarState {
            x: 123.25,
            y: -7.5,
            rotation: 359.9,
            turn: -0.35,
            accelerate: 1,
            brake: 0,
            reserved: [0; 2],
            move_x: 1e-7,
            move_y: f32::MAX,
            speed: -250.0,
        }
    }

    #[test]
    fn test_car_state_change_keeps_every_field() {
        let event = Event::Race(RaceEvent::CarStateChange {
            name: "ayrton".into(),
            state: sample_state(),
        });

        let decoded = decode(&encode(&event).unwrap()).unwrap();

        let Event::Race(RaceEvent::CarStateChange { name, state }) = decoded else {
            panic!("expected car state change, got {decoded:?}");
        };
        assert_eq!(name, "ayrton");
        let expected = sample_state();
        assert_eq!(state.x.to_bits(), expected.x.to_bits());
        assert_eq!(state.y.to_bits(), expected.y.to_bits());
        assert_eq!(state.rotation.to_bits(), expected.rotation.to_bits());
        assert_eq!(state.turn.to_bits(), expected.turn.to_bits());
        assert_eq!(state.accelerate, 1);
        assert_eq!(state.brake, 0);
        assert_eq!(state.move_x.to_bits(), expected.move_x.to_bits());
        assert_eq!(state.move_y.to_bits(), expected.move_y.to_bits());
        assert_eq!(state.speed.to_bits(), expected.speed.to_bits());
    }

    #[test]
    fn test_game_state_preserves_order() {
        let mut gs = GameState::new("figure_eight");
        for (i, name) in ["zed", "amy", "bob"].into_iter().enumerate() {
            gs.add_player(
                name,
                CarState {
                    speed: i as f32,
                    ..CarState::default()
                },
            );
        }

        let Event::GameState(decoded) = decode(&encode(&Event::GameState(gs)).unwrap()).unwrap() else {
            panic!("expected gamestate");
        };

        assert_eq!(decoded.level(), "figure_eight");
        assert_eq!(decoded.player_count(), 3);
        assert_eq!(decoded.player_name(0), Some("zed"));
        assert_eq!(decoded.player_name(2), Some("bob"));
        assert_eq!(decoded.car_state(1).map(|s| s.speed), Some(1.0));
    }

    #[test]
    fn test_ragged_game_state_is_rejected() {
        let mut s = EventSerializer::new();
        s.write_str(names::GAMESTATE).unwrap();
        s.write_str("oval").unwrap();
        s.write_u16(2);
        s.write_str("a").unwrap();
        s.write_str("b").unwrap();
        s.write_u16(1);
        s.write_pod(&CarState::default());

        assert_eq!(
            decode(s.as_slice()),
            Err(ProtocolError::LengthMismatch { names: 2, states: 1 })
        );
    }

    #[test]
    fn test_unknown_names_are_typed_errors() {
        for name in ["general:dance", "race:pit_stop", "chat:hello"] {
            let mut s = EventSerializer::new();
            s.write_str(name).unwrap();
            assert_eq!(decode(s.as_slice()), Err(ProtocolError::UnknownEvent(name.into())));
        }
    }

    #[test]
    fn test_truncated_and_trailing() {
        let bytes = encode(&Event::PlayerConnected("kimi".into())).unwrap();
        assert_eq!(decode(&bytes[..bytes.len() - 1]), Err(ProtocolError::Truncated));

        let mut longer = bytes.clone();
        longer.push(0);
        assert_eq!(decode(&longer), Err(ProtocolError::TrailingBytes(1)));
        assert_eq!(decode(&[]), Err(ProtocolError::Truncated));
    }

    #[test]
    fn test_bad_goodbye_and_utf8() {
        let mut s = EventSerializer::new();
        s.write_str(names::GOODBYE).unwrap();
        s.write_u8(77);
        assert_eq!(decode(s.as_slice()), Err(ProtocolError::InvalidGoodbyeReason(77)));

        let mut s = EventSerializer::new();
        s.write_str(names::INIT_RACE).unwrap();
        s.write_u16(2);
        s.write_u8(0xff);
        s.write_u8(0xfe);
        assert_eq!(decode(s.as_slice()), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn test_simple_events() {
        for event in [
            Event::Welcome,
            Event::Goodbye(GoodbyeReason::NameAlreadyInUse),
            Event::PlayerInfo {
                name: "nigel".into(),
                protocol_version: 7,
            },
            Event::PlayerDisconnected("nigel".into()),
            Event::InitRace("oval".into()),
            Event::Race(RaceEvent::TriggerRaceStart),
        ] {
            assert_eq!(decode(&encode(&event).unwrap()), Ok(event));
        }
    }

    #[test]
    fn test_oversized_string_overflows() {
        let name = "x".repeat(usize::from(u16::MAX) + 1);
        assert_eq!(encode(&Event::PlayerConnected(name)), Err(ProtocolError::Overflow));
    }
}
