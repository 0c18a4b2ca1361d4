//! BLE Service and Characteristic UUIDs.
//!
//! Contains all UUID constants used for Bluetti power station communication.

use uuid::Uuid;

// Generic Access Service (Standard BLE)
/// Device Name characteristic UUID.
pub const DEVICE_NAME_UUID: Uuid = Uuid::from_u128(0x0000_2a00_0000_1000_8000_00805f9b34fb);

// Modbus-over-GATT Service (Bluetti Custom)
/// Bluetti command service UUID.
pub const BLUETTI_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_ff00_0000_1000_8000_00805f9b34fb);
/// Notify characteristic UUID (response chunks from the device).
pub const NOTIFY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_ff01_0000_1000_8000_00805f9b34fb);
/// Write characteristic UUID (command frames to the device).
pub const WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_ff02_0000_1000_8000_00805f9b34fb);

/// Check if a service UUID is the Bluetti command service.
pub fn is_bluetti_service(uuid: &Uuid) -> bool {
    *uuid == BLUETTI_SERVICE_UUID
}
