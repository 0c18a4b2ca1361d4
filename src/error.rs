//! Error types for the bluetti-rust-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No peripheral with the requested address was seen before the deadline.
    #[error("Device not found: {address}")]
    DeviceNotFound {
        /// The address that was searched for.
        address: String,
    },

    /// Operation requires a connection but the device is not connected.
    #[error("Device not connected")]
    NotConnected,

    /// Failed to establish the GATT connection or notification subscription.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// The link dropped while a transaction was in flight.
    #[error("Connection lost")]
    ConnectionLost,

    /// Not enough response bytes arrived before the deadline.
    #[error("Response timeout")]
    Timeout,

    /// The response frame was malformed.
    #[error("Invalid response: {context}")]
    InvalidResponse {
        /// Description of what was invalid about the frame.
        context: String,
    },

    /// CRC check failed for a response frame.
    #[error("CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch {
        /// The CRC computed over the received bytes.
        expected: u16,
        /// The CRC carried in the frame trailer.
        actual: u16,
    },

    /// The device answered with a Modbus exception frame.
    #[error("Device exception {code:#04x} for function {function:#04x}")]
    DeviceException {
        /// The function code of the rejected request.
        function: u8,
        /// The exception code reported by the device.
        code: u8,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this is an ordinary per-command failure.
    ///
    /// Transaction failures leave the session usable. Any other error seen
    /// while performing a command means the session can no longer be trusted.
    pub fn is_transaction_failure(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::InvalidResponse { .. }
                | Self::CrcMismatch { .. }
                | Self::DeviceException { .. }
        )
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
