//! GATT transport for Modbus frames.
//!
//! A transport owns exactly one BLE connection: it writes command frames to
//! the write characteristic and hands over notification chunks from the
//! notify characteristic in arrival order, without coalescing them.

use async_trait::async_trait;
use btleplug::api::{BDAddr, CharPropFlags, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

use crate::ble::scanner;
use crate::ble::uuids::*;
use crate::error::{Error, Result};
use crate::utils::to_hex;

/// Capacity of the channel between the notification stream and the engine.
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

/// Split a connect timeout into the scan budget and the tail held back for
/// closing a link that did not come up in time.
fn connect_budget(timeout: Duration) -> (Duration, Duration) {
    (timeout / 2, timeout / 10)
}

/// A single command/notification link to the device.
///
/// Implementations are driven from one task at a time and are never shared.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Establish the link and subscribe to notifications.
    ///
    /// On failure the transport is left unconnected.
    async fn connect(&mut self, timeout: Duration) -> Result<()>;

    /// Unsubscribe and tear the link down. A no-op when not connected.
    async fn disconnect(&mut self) -> Result<()>;

    /// Send a frame to the command characteristic.
    async fn write(&mut self, frame: &[u8]) -> Result<()>;

    /// Wait for the next notification chunk.
    ///
    /// Returns `None` once the link is gone and no more chunks can arrive.
    async fn next_chunk(&mut self) -> Option<Vec<u8>>;

    /// Discard chunks that are already queued, returning how many were dropped.
    fn drain_stale(&mut self) -> usize;

    /// Whether the link is currently up.
    fn is_connected(&self) -> bool;
}

/// Live GATT link state.
struct Link {
    peripheral: Peripheral,
    write_characteristic: Characteristic,
    notify_characteristic: Characteristic,
    notifications: mpsc::Receiver<Vec<u8>>,
    forwarder: JoinHandle<()>,
}

/// [`Transport`] over a btleplug peripheral, located by Bluetooth address.
pub struct BleTransport {
    address: BDAddr,
    link: Option<Link>,
    device_name: Option<String>,
}

impl BleTransport {
    /// Create an unconnected transport for the device at `address`.
    pub fn new(address: BDAddr) -> Self {
        Self {
            address,
            link: None,
            device_name: None,
        }
    }

    /// The device's Bluetooth address.
    pub fn address(&self) -> BDAddr {
        self.address
    }

    /// The GATT device name read during the last successful connect.
    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    async fn open(&mut self, peripheral: &Peripheral) -> Result<Link> {
        peripheral.connect().await.map_err(Error::Bluetooth)?;
        info!("Connected to {}", self.address);

        self.attach(peripheral).await
    }

    /// Resolve characteristics, subscribe and start forwarding notifications.
    async fn attach(&mut self, peripheral: &Peripheral) -> Result<Link> {
        peripheral
            .discover_services()
            .await
            .map_err(Error::Bluetooth)?;

        if !peripheral
            .services()
            .iter()
            .any(|service| is_bluetti_service(&service.uuid))
        {
            return Err(Error::ServiceNotFound {
                uuid: BLUETTI_SERVICE_UUID.to_string(),
            });
        }

        let characteristics = peripheral.characteristics();
        let find = |uuid: uuid::Uuid| {
            characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| Error::CharacteristicNotFound {
                    uuid: uuid.to_string(),
                })
        };

        let write_characteristic = find(WRITE_CHARACTERISTIC_UUID)?;
        let notify_characteristic = find(NOTIFY_CHARACTERISTIC_UUID)?;

        self.device_name = match find(DEVICE_NAME_UUID) {
            Ok(c) => match peripheral.read(&c).await {
                Ok(raw) => {
                    let name = String::from_utf8_lossy(&raw)
                        .trim_end_matches('\0')
                        .to_string();
                    info!("Device name: {}", name);
                    Some(name)
                }
                Err(e) => {
                    debug!("Could not read device name: {}", e);
                    None
                }
            },
            Err(_) => None,
        };

        let mut stream = peripheral.notifications().await.map_err(Error::Bluetooth)?;
        peripheral
            .subscribe(&notify_characteristic)
            .await
            .map_err(Error::Bluetooth)?;
        debug!("Subscribed to {}", NOTIFY_CHARACTERISTIC_UUID);

        let (tx, notifications) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let forwarder = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid != NOTIFY_CHARACTERISTIC_UUID {
                    continue;
                }

                trace!("RX {}", to_hex(&notification.value));

                if tx.send(notification.value).await.is_err() {
                    break;
                }
            }
            debug!("Notification forwarder stopped");
        });

        Ok(Link {
            peripheral: peripheral.clone(),
            write_characteristic,
            notify_characteristic,
            notifications,
            forwarder,
        })
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }

        info!("Connecting to {}", self.address);

        let deadline = Instant::now() + timeout;
        let (scan_budget, cleanup_reserve) = connect_budget(timeout);
        let link_deadline = deadline - cleanup_reserve;
        let timed_out = || Error::ConnectionFailed {
            reason: format!("Timed out after {:?}", timeout),
        };

        let peripheral = timeout_at(
            link_deadline,
            scanner::find_peripheral(self.address, scan_budget),
        )
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| Error::ConnectionFailed {
            reason: e.to_string(),
        })?;

        let error = match timeout_at(link_deadline, self.open(&peripheral)).await {
            Ok(Ok(link)) => {
                self.link = Some(link);
                return Ok(());
            }
            Ok(Err(e)) => Error::ConnectionFailed {
                reason: e.to_string(),
            },
            Err(_) => timed_out(),
        };

        // The peripheral may be connected even though the link is unusable.
        match timeout_at(deadline, peripheral.disconnect()).await {
            Ok(Ok(())) => debug!("Closed half-open link to {}", self.address),
            Ok(Err(e)) => debug!("Failed to close half-open link: {}", e),
            Err(_) => debug!("Timed out closing half-open link to {}", self.address),
        }

        Err(error)
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(link) = self.link.take() else {
            return Ok(());
        };

        info!("Disconnecting from {}", self.address);
        link.forwarder.abort();

        if let Err(e) = link
            .peripheral
            .unsubscribe(&link.notify_characteristic)
            .await
        {
            warn!("Failed to unsubscribe: {}", e);
        }

        link.peripheral.disconnect().await.map_err(Error::Bluetooth)
    }

    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        let link = self.link.as_ref().ok_or(Error::NotConnected)?;

        let write_type = if link
            .write_characteristic
            .properties
            .contains(CharPropFlags::WRITE)
        {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        trace!("TX {}", to_hex(frame));

        link.peripheral
            .write(&link.write_characteristic, frame, write_type)
            .await
            .map_err(Error::Bluetooth)
    }

    async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        match self.link.as_mut() {
            Some(link) => link.notifications.recv().await,
            None => None,
        }
    }

    fn drain_stale(&mut self) -> usize {
        let Some(link) = self.link.as_mut() else {
            return 0;
        };

        let mut dropped = 0;
        while link.notifications.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.forwarder.abort();
        }
    }
}
