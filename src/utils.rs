//! Utility functions for the bluetti-rust-ble crate.

use std::fmt::Write as _;

/// Unpack a register payload into big-endian `u16` values.
///
/// A trailing odd byte cannot form a register and is ignored.
///
/// # Example
///
/// ```
/// use bluetti_rust_ble::utils::registers_from_payload;
///
/// assert_eq!(registers_from_payload(&[0x00, 0x4D, 0x01, 0x00]), vec![77, 256]);
/// ```
pub fn registers_from_payload(payload: &[u8]) -> Vec<u16> {
    payload
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Format bytes as lowercase hex for log output.
pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
