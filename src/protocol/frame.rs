//! Wire framing for commands and responses.
//!
//! Frame format (both directions):
//! - Station address (1), always 0x01
//! - Function code (1)
//! - Payload (N)
//! - CRC16/MODBUS over all preceding bytes (2, little-endian)
//!
//! Read responses carry a byte count after the function code, so their
//! register data starts at offset 3. Write responses echo the request.

use crate::error::{Error, Result};
use crate::protocol::command::{Command, EXCEPTION_FLAG, STATION_ADDRESS};
use crate::protocol::crc::{append_crc, calculate_crc};

/// Address + function + byte count.
pub const HEADER_SIZE: usize = 3;

/// Trailing CRC.
pub const CRC_SIZE: usize = 2;

/// Address + function + exception code + CRC.
pub const EXCEPTION_FRAME_SIZE: usize = 5;

/// Smallest frame `validate` will look at.
const MIN_FRAME_SIZE: usize = 3;

/// Encode a command into a wire frame.
pub fn encode(command: &Command) -> Vec<u8> {
    let mut body = Vec::with_capacity(6);
    body.push(STATION_ADDRESS);
    body.push(command.function().to_raw());
    body.extend_from_slice(&command.payload());
    append_crc(&body)
}

/// Length of a complete, successful response to `command`.
pub fn response_size(command: &Command) -> usize {
    match *command {
        Command::ReadHoldingRegisters { quantity, .. } => {
            HEADER_SIZE + 2 * quantity as usize + CRC_SIZE
        }
        // Echo of address + function + 4-byte payload + CRC.
        Command::WriteSingleRegister { .. } => 2 + 4 + CRC_SIZE,
    }
}

/// Check a frame's trailing CRC, reporting why it failed.
pub fn verify(frame: &[u8]) -> Result<()> {
    if frame.len() < MIN_FRAME_SIZE {
        return Err(Error::InvalidResponse {
            context: format!("Frame too short: {} bytes", frame.len()),
        });
    }

    let body_len = frame.len() - CRC_SIZE;
    let expected = calculate_crc(&frame[..body_len]);
    let actual = u16::from_le_bytes([frame[body_len], frame[body_len + 1]]);

    if expected != actual {
        return Err(Error::CrcMismatch { expected, actual });
    }

    Ok(())
}

/// Whether a frame's trailing CRC is valid.
pub fn validate(frame: &[u8]) -> bool {
    verify(frame).is_ok()
}

/// Strip the 3-byte header and 2-byte CRC.
///
/// Does not re-validate the frame. Frames too short to hold a header and
/// CRC yield an empty payload.
pub fn decode_payload(frame: &[u8]) -> &[u8] {
    if frame.len() < HEADER_SIZE + CRC_SIZE {
        return &[];
    }
    &frame[HEADER_SIZE..frame.len() - CRC_SIZE]
}

/// Recognize a Modbus exception reply to `command` at the start of `buffer`.
///
/// Returns the exception code once a complete, CRC-valid exception frame
/// has been buffered.
pub fn exception_code(command: &Command, buffer: &[u8]) -> Option<u8> {
    if buffer.len() < EXCEPTION_FRAME_SIZE {
        return None;
    }

    let candidate = &buffer[..EXCEPTION_FRAME_SIZE];
    let is_exception = candidate[0] == STATION_ADDRESS
        && candidate[1] == command.function().to_raw() | EXCEPTION_FLAG;

    if is_exception && validate(candidate) {
        Some(candidate[2])
    } else {
        None
    }
}
