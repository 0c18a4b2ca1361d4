//! Protocol module for building and checking Modbus frames.
//!
//! This module contains the implementations for:
//! - Command construction
//! - Frame encoding, validation and payload extraction
//! - CRC calculation

pub mod command;
pub mod crc;
pub mod frame;

pub use command::{Command, FunctionCode};
pub use crc::calculate_crc;
