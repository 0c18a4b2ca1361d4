// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]
#![warn(missing_docs)]

//! # bluetti-rust-ble
//!
//! A blocking Rust client for Bluetti power stations (AC500 and compatible)
//! speaking Modbus RTU framing over Bluetooth Low Energy.
//!
//! Commands are written to a GATT characteristic and responses come back as
//! notification chunks that must be reassembled. The protocol carries no
//! request identifier, so the client serializes every transaction.
//!
//! ## Layers
//!
//! - [`protocol`]: CRC16, command encoding and response frame checks
//! - [`ble`]: the GATT [`Transport`] and connection state
//! - [`transaction`]: one command/response exchange with a deadline
//! - [`client`]: [`SyncClient`], a blocking facade backed by a worker thread
//! - [`poller`]: [`Poller`], poll cycles across register blocks and battery packs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bluetti_rust_ble::{BleTransport, Poller, SyncClient};
//! use std::sync::Arc;
//!
//! let address = "AC:50:00:12:34:56".parse().unwrap();
//! let client = Arc::new(SyncClient::new(BleTransport::new(address)));
//! let mut poller = Poller::new(client);
//!
//! if poller.connect() {
//!     for (name, value) in poller.poll() {
//!         println!("{}: {}", name, value);
//!     }
//!     poller.set_ac_output(true);
//!     poller.disconnect();
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data and config types

// Public modules
pub mod ble;
pub mod client;
pub mod config;
pub mod data;
pub mod error;
pub mod poller;
pub mod protocol;
pub mod transaction;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use ble::connection::ConnectionState;
pub use ble::transport::{BleTransport, Transport};
pub use client::SyncClient;
pub use config::{ClientConfig, PackPlan, PollPlan};
pub use error::{Error, Result};
pub use poller::Poller;
pub use protocol::{Command, FunctionCode};
pub use transaction::TransactionEngine;

pub use data::{
    transition_times, Ac500Decoder, AutoSleepMode, ControlRegister, FieldMap, FieldValue,
    OutputMode, RegisterDecoder, TimeOfDay, UpsMode,
};
