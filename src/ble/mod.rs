//! BLE communication module.
//!
//! This module provides the Bluetooth Low Energy link to the power station:
//! locating it by address, the GATT transport for Modbus frames and the
//! connection state tracked by the blocking client.

pub mod connection;
pub mod scanner;
pub mod transport;
pub mod uuids;

pub use connection::{ConnectionState, StateCell};
pub use scanner::{default_adapter, find_peripheral};
pub use transport::{BleTransport, Transport, NOTIFICATION_CHANNEL_CAPACITY};
pub use uuids::*;
