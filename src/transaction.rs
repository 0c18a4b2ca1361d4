//! Command/response transactions.
//!
//! A transaction writes one command frame and reassembles the response out
//! of however many notification chunks the device splits it into. The
//! protocol carries no request identifier, so transactions must never
//! overlap; the engine relies on its caller to run them one at a time.

use bytes::BytesMut;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

use crate::ble::transport::Transport;
use crate::error::{Error, Result};
use crate::protocol::{frame, Command};
use crate::utils::to_hex;

/// Drives commands over a [`Transport`] to completion.
pub struct TransactionEngine<T: Transport> {
    transport: T,
}

impl<T: Transport> TransactionEngine<T> {
    /// Create an engine that owns `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get the underlying transport mutably, e.g. to connect it.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Execute one command and return the response payload.
    ///
    /// The whole transaction, including the write, is bounded by `timeout`.
    /// Response bytes beyond the expected frame length are discarded.
    ///
    /// # Errors
    ///
    /// - `Timeout` if the full response has not arrived by the deadline
    /// - `CrcMismatch` if the response fails its CRC check
    /// - `DeviceException` if the device rejected the command
    /// - `ConnectionLost` if the notification stream ends mid-transaction
    pub async fn execute(&mut self, command: &Command, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;

        let stale = self.transport.drain_stale();
        if stale > 0 {
            debug!(
                "Discarded {} stale notification chunk(s) before {}",
                stale, command
            );
        }

        let request = command.encode();
        let expected = command.response_size();
        trace!("{} -> {}", command, to_hex(&request));

        match timeout_at(deadline, self.transport.write(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Timeout writing {}", command);
                return Err(Error::Timeout);
            }
        }

        let mut buffer = BytesMut::with_capacity(expected);
        while buffer.len() < expected {
            match timeout_at(deadline, self.transport.next_chunk()).await {
                Ok(Some(chunk)) => buffer.extend_from_slice(&chunk),
                Ok(None) => {
                    warn!("Link closed while waiting for response to {}", command);
                    return Err(Error::ConnectionLost);
                }
                Err(_) => {
                    warn!(
                        "Timeout waiting for response to {}: got {} of {} bytes",
                        command,
                        buffer.len(),
                        expected
                    );
                    return Err(Error::Timeout);
                }
            }

            if let Some(code) = frame::exception_code(command, &buffer) {
                warn!("Device rejected {} with exception {:#04x}", command, code);
                return Err(Error::DeviceException {
                    function: command.function().to_raw(),
                    code,
                });
            }
        }

        if buffer.len() > expected {
            debug!(
                "Discarding {} surplus byte(s) after response to {}",
                buffer.len() - expected,
                command
            );
            buffer.truncate(expected);
        }

        if let Err(e) = frame::verify(&buffer) {
            warn!(
                "Invalid response for {}: {} ({})",
                command,
                to_hex(&buffer),
                e
            );
            return Err(e);
        }

        Ok(frame::decode_payload(&buffer).to_vec())
    }

    /// Disconnect the transport if it is still up, giving up after `timeout`.
    pub async fn shutdown(&mut self, timeout: Duration) {
        if !self.transport.is_connected() {
            return;
        }

        match tokio::time::timeout(timeout, self.transport.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Error disconnecting during shutdown: {}", e),
            Err(_) => warn!("Disconnect during shutdown timed out after {:?}", timeout),
        }
    }
}
