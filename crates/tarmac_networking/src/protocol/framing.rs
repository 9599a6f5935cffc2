//! # Framing
//!
//! TCP is a byte stream; each event travels as one frame:
//!
//! ```text
//! [len: u32 LE] [payload: len bytes]
//! ```

use std::io::{self, Read, Write};

use tarmac_shared::MAX_FRAME_SIZE;

use crate::error::ProtocolError;

/// Size of the length prefix.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Writes one frame.
///
/// # Errors
///
/// `InvalidInput` for payloads over the frame limit, or any write error.
pub fn write_frame(writer: &mut impl Write, payload: &[u8]) -> io::Result<()> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            ProtocolError::FrameTooLarge(payload.len()),
        ));
    }

    let len = payload.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Reads one frame. `Ok(None)` means the peer closed between frames.
///
/// # Errors
///
/// `InvalidData` for a length over the limit, `UnexpectedEof` if the
/// stream ends inside a frame, or any read error.
pub fn read_frame(reader: &mut impl Read) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, ProtocolError::FrameTooLarge(len)));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}
