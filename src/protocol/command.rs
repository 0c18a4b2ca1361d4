//! Modbus commands understood by the device.
//!
//! Only two functions are used over the BLE link: reading a block of
//! holding registers and writing a single register.

use std::fmt;

use crate::protocol::frame;

/// Station address carried in every frame. The BLE link is point to point,
/// so the device always answers as station 1.
pub const STATION_ADDRESS: u8 = 0x01;

/// Bit set in the function code of an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Modbus exception codes a device may report.
pub mod exceptions {
    /// The function code is not supported.
    pub const ILLEGAL_FUNCTION: u8 = 0x01;
    /// The register address is outside the device's map.
    pub const ILLEGAL_DATA_ADDRESS: u8 = 0x02;
    /// The value is not acceptable for the register.
    pub const ILLEGAL_DATA_VALUE: u8 = 0x03;
    /// The device failed while handling the request.
    pub const SERVER_DEVICE_FAILURE: u8 = 0x04;
    /// The device is busy with a long-running command.
    pub const SERVER_DEVICE_BUSY: u8 = 0x06;
}

/// Modbus function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    /// Read holding registers (0x03).
    ReadHoldingRegisters = 0x03,
    /// Write single register (0x06).
    WriteSingleRegister = 0x06,
}

impl FunctionCode {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0x03 => Some(Self::ReadHoldingRegisters),
            0x06 => Some(Self::WriteSingleRegister),
            _ => None,
        }
    }

    /// Convert to raw byte value.
    pub fn to_raw(&self) -> u8 {
        *self as u8
    }

    /// The function code the device uses when rejecting this function.
    pub fn exception_code(&self) -> u8 {
        self.to_raw() | EXCEPTION_FLAG
    }
}

/// A single request to the device.
///
/// Commands are immutable values; build a new one per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Read `quantity` consecutive holding registers starting at `start`.
    ReadHoldingRegisters {
        /// First register address.
        start: u16,
        /// Number of registers to read.
        quantity: u16,
    },
    /// Write `value` to a single holding register.
    WriteSingleRegister {
        /// Register address.
        register: u16,
        /// New register value.
        value: u16,
    },
}

impl Command {
    /// Build a read-holding-registers command.
    pub fn read(start: u16, quantity: u16) -> Self {
        Self::ReadHoldingRegisters { start, quantity }
    }

    /// Build a write-single-register command.
    pub fn write(register: u16, value: u16) -> Self {
        Self::WriteSingleRegister { register, value }
    }

    /// The function code of this command.
    pub fn function(&self) -> FunctionCode {
        match self {
            Self::ReadHoldingRegisters { .. } => FunctionCode::ReadHoldingRegisters,
            Self::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
        }
    }

    /// The register address the command targets.
    pub fn address(&self) -> u16 {
        match *self {
            Self::ReadHoldingRegisters { start, .. } => start,
            Self::WriteSingleRegister { register, .. } => register,
        }
    }

    /// The 4-byte big-endian request payload.
    pub fn payload(&self) -> [u8; 4] {
        let (first, second) = match *self {
            Self::ReadHoldingRegisters { start, quantity } => (start, quantity),
            Self::WriteSingleRegister { register, value } => (register, value),
        };
        let [a, b] = first.to_be_bytes();
        let [c, d] = second.to_be_bytes();
        [a, b, c, d]
    }

    /// Encode to a complete wire frame.
    pub fn encode(&self) -> Vec<u8> {
        frame::encode(self)
    }

    /// Length in bytes of a complete, successful response.
    pub fn response_size(&self) -> usize {
        frame::response_size(self)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadHoldingRegisters { start, quantity } => {
                write!(f, "ReadHoldingRegisters(start={}, quantity={})", start, quantity)
            }
            Self::WriteSingleRegister { register, value } => {
                write!(f, "WriteSingleRegister(register={}, value={})", register, value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_code_from_raw() {
        assert_eq!(
            FunctionCode::from_raw(0x03),
            Some(FunctionCode::ReadHoldingRegisters)
        );
        assert_eq!(
            FunctionCode::from_raw(0x06),
            Some(FunctionCode::WriteSingleRegister)
        );
        assert_eq!(FunctionCode::from_raw(0x10), None);
    }

    #[test]
    fn test_exception_code() {
        assert_eq!(FunctionCode::ReadHoldingRegisters.exception_code(), 0x83);
        assert_eq!(FunctionCode::WriteSingleRegister.exception_code(), 0x86);
    }

    #[test]
    fn test_payload_is_big_endian() {
        assert_eq!(Command::read(10, 40).payload(), [0x00, 0x0A, 0x00, 0x28]);
        assert_eq!(Command::write(3006, 2).payload(), [0x0B, 0xBE, 0x00, 0x02]);
    }

    #[test]
    fn test_accessors() {
        let cmd = Command::read(3001, 61);
        assert_eq!(cmd.function(), FunctionCode::ReadHoldingRegisters);
        assert_eq!(cmd.address(), 3001);

        let cmd = Command::write(3007, 1);
        assert_eq!(cmd.function(), FunctionCode::WriteSingleRegister);
        assert_eq!(cmd.address(), 3007);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Command::read(10, 40).to_string(),
            "ReadHoldingRegisters(start=10, quantity=40)"
        );
        assert_eq!(
            Command::write(3006, 4).to_string(),
            "WriteSingleRegister(register=3006, value=4)"
        );
    }
}
