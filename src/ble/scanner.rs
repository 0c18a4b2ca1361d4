//! Locating a power station by its Bluetooth address.
//!
//! The device is always addressed directly; there is no discovery of
//! unknown devices here, only a bounded scan until the known address shows up.

use btleplug::api::{BDAddr, Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::{Stream, StreamExt};
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};

/// Get the first Bluetooth adapter on this system.
///
/// # Errors
///
/// Returns `BluetoothUnavailable` if there is no adapter.
pub async fn default_adapter() -> Result<Adapter> {
    let manager = Manager::new()
        .await
        .map_err(|_e| Error::BluetoothUnavailable)?;

    let adapter = manager
        .adapters()
        .await
        .map_err(Error::Bluetooth)?
        .into_iter()
        .next()
        .ok_or(Error::BluetoothUnavailable)?;

    info!(
        "Using Bluetooth adapter: {:?}",
        adapter.adapter_info().await.ok()
    );

    Ok(adapter)
}

/// Scan until a peripheral with `address` is seen, or `timeout` elapses.
///
/// # Errors
///
/// Returns `DeviceNotFound` if the address does not show up in time.
pub async fn find_peripheral(address: BDAddr, timeout: Duration) -> Result<Peripheral> {
    let adapter = default_adapter().await?;
    let events = adapter.events().await.map_err(Error::Bluetooth)?;

    debug!("Scanning for {}", address);
    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(Error::Bluetooth)?;

    let found = tokio::time::timeout(timeout, scan_for(&adapter, events, address)).await;

    if let Err(e) = adapter.stop_scan().await {
        debug!("Failed to stop scan: {}", e);
    }

    match found {
        Ok(result) => result,
        Err(_) => Err(Error::DeviceNotFound {
            address: address.to_string(),
        }),
    }
}

async fn scan_for<S>(adapter: &Adapter, mut events: S, address: BDAddr) -> Result<Peripheral>
where
    S: Stream<Item = CentralEvent> + Unpin,
{
    // The adapter may already know the device from an earlier scan.
    for peripheral in adapter.peripherals().await.map_err(Error::Bluetooth)? {
        if peripheral.address() == address {
            debug!("{} already known to adapter", address);
            return Ok(peripheral);
        }
    }

    while let Some(event) = events.next().await {
        let id = match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
            _ => continue,
        };

        let peripheral = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                continue;
            }
        };

        if peripheral.address() == address {
            info!("Found device {}", address);
            return Ok(peripheral);
        }
    }

    Err(Error::DeviceNotFound {
        address: address.to_string(),
    })
}
