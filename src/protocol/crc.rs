//! CRC calculation for Modbus frames.
//!
//! Uses the reflected CRC-16/MODBUS polynomial (0xA001, i.e. 0x8005 bit
//! reversed) with initial value 0xFFFF. The checksum is carried
//! little-endian at the end of every frame.

/// Reflected CRC-16/MODBUS polynomial.
const CRC_POLYNOMIAL: u16 = 0xA001;

/// Initial CRC value.
const CRC_INITIAL: u16 = 0xFFFF;

/// Byte-wise lookup table, built at compile time.
static CRC_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Calculate CRC-16/MODBUS for a byte slice.
///
/// # Example
///
/// ```
/// use bluetti_rust_ble::protocol::calculate_crc;
///
/// assert_eq!(calculate_crc(b"123456789"), 0x4B37);
/// ```
pub fn calculate_crc(data: &[u8]) -> u16 {
    data.iter().fold(CRC_INITIAL, |crc, &byte| {
        (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u16) & 0x00FF) as usize]
    })
}

/// Append the little-endian CRC to a copy of `data`.
pub fn append_crc(data: &[u8]) -> Vec<u8> {
    let crc = calculate_crc(data);
    let mut result = Vec::with_capacity(data.len() + 2);
    result.extend_from_slice(data);
    result.extend_from_slice(&crc.to_le_bytes());
    result
}
