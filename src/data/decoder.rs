//! Register block decoding.
//!
//! A decoder turns the payload of a read response into named fields. It is
//! keyed by the start address of the read, since the same registers mean
//! different things in different blocks.

use std::collections::BTreeMap;
use tracing::debug;

use crate::data::fields::{FieldMap, FieldValue};
use crate::data::schedule::{SCHEDULE_END, SCHEDULE_START};
use crate::utils::registers_from_payload;

/// Decodes read-response payloads into fields.
#[cfg_attr(test, mockall::automock)]
pub trait RegisterDecoder {
    /// Decode `payload`, read starting at `starting_address`.
    ///
    /// Unknown blocks and payloads too short for a field group decode to
    /// fewer (possibly zero) fields; decoding never fails.
    fn decode(&self, starting_address: u16, payload: &[u8]) -> FieldMap;
}

impl<F> RegisterDecoder for F
where
    F: Fn(u16, &[u8]) -> FieldMap,
{
    fn decode(&self, starting_address: u16, payload: &[u8]) -> FieldMap {
        self(starting_address, payload)
    }
}

/// Register map of the AC500 power station.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ac500Decoder;

impl Ac500Decoder {
    /// Core block: device info and power totals.
    pub const CORE_START: u16 = 10;
    /// Detailed block: inverter internals.
    pub const DETAILED_START: u16 = 70;
    /// Control block: modes and switches.
    pub const CONTROL_START: u16 = 3001;
    /// Pack block: the currently selected battery pack.
    pub const PACK_START: u16 = 91;

    /// Create a decoder for the AC500 register map.
    pub fn new() -> Self {
        Self
    }

    fn decode_core(v: &[u16], out: &mut Fields) {
        if v.len() < 40 {
            return;
        }

        let device_type: String = v[0..6]
            .iter()
            .filter(|value| **value != 0)
            .flat_map(|value| value.to_be_bytes())
            .filter(|byte| *byte != 0)
            .map(char::from)
            .collect();
        out.set("device_type", device_type.trim().to_string());

        let word = |i: usize| u64::from(v[i]);
        let serial =
            (word(7) << 48) | (word(8) << 32) | (word(9) << 16) | (word(10) << 16) | word(11);
        out.set("serial_number", serial);

        out.set("arm_version", version(v[13]));
        out.set("dsp_version", version(v[15]));
        out.set("dc_input_power", v[26]);
        out.set("ac_input_power", v[27]);
        out.set("ac_output_power", v[28]);
        out.set("dc_output_power", v[29]);
        out.set("power_generation", tenths(v[31]));
        out.set("total_battery_percent", v[33]);
        out.set("ac_output_on", v[38] != 0);
        out.set("dc_output_on", v[39] != 0);
    }

    fn decode_detailed(v: &[u16], out: &mut Fields) {
        if v.len() < 21 {
            return;
        }

        out.set("ac_output_mode", v[0]);
        out.set("internal_ac_voltage", tenths(v[1]));
        out.set("internal_current_one", tenths(v[2]));
        out.set("internal_power_one", v[3]);
        out.set("internal_ac_frequency", hundredths(v[4]));
        out.set("internal_current_two", tenths(v[5]));
        out.set("internal_power_two", v[6]);
        out.set("ac_input_voltage", tenths(v[7]));
        out.set("internal_current_three", tenths(v[8]));
        out.set("internal_power_three", v[9]);
        out.set("ac_input_frequency", hundredths(v[10]));
        out.set("internal_dc_input_voltage", tenths(v[16]));
        out.set("internal_dc_input_power", v[17]);
        out.set("internal_dc_input_current", tenths(v[18]));
        out.set("ac_charging_power", v[19]);
    }

    fn decode_control(v: &[u16], out: &mut Fields) {
        if v.len() >= 6 {
            out.set("ups_mode", v[0]);
            out.set("split_phase_on", v[3] != 0);
            out.set("pack_num_configured", v[5]);
        }

        if v.len() >= 11 {
            out.set("ac_output_on", v[6] != 0);
            out.set("dc_output_on", v[7] != 0);
            out.set("grid_charge_on", v[10] != 0);
        }

        if v.len() >= 16 {
            out.set("time_control_on", v[12] != 0);
            out.set("battery_range_start", v[14]);
            out.set("battery_range_end", v[15]);
        }

        if v.len() >= 36 {
            out.set("bluetooth_connected", v[35] != 0);
        }

        let schedule_len = usize::from(SCHEDULE_END - Self::CONTROL_START) + 1;
        if v.len() >= schedule_len {
            let first = usize::from(SCHEDULE_START - Self::CONTROL_START);
            let programming: BTreeMap<u16, u16> = (SCHEDULE_START..=SCHEDULE_END)
                .zip(v[first..schedule_len].iter().copied())
                .collect();
            out.set("time_control_programming", FieldValue::Registers(programming));
        }

        if v.len() >= 61 {
            out.set("auto_sleep_mode", v[60]);
        }
    }

    fn decode_pack(v: &[u16], out: &mut Fields) {
        if v.len() < 9 {
            return;
        }

        out.set("pack_num_max_bms", v[0]);
        out.set("total_voltage", tenths(v[1]));
        out.set("pack_voltage", hundredths(v[7]));
        out.set("battery_percent", v[8]);
    }
}

impl RegisterDecoder for Ac500Decoder {
    fn decode(&self, starting_address: u16, payload: &[u8]) -> FieldMap {
        let values = registers_from_payload(payload);
        let mut out = Fields::default();

        match starting_address {
            Self::CORE_START => Self::decode_core(&values, &mut out),
            Self::DETAILED_START => Self::decode_detailed(&values, &mut out),
            Self::CONTROL_START => Self::decode_control(&values, &mut out),
            Self::PACK_START => Self::decode_pack(&values, &mut out),
            _ => debug!("No register map for block at {}", starting_address),
        }

        if out.0.is_empty() && !values.is_empty() {
            debug!(
                "Block at {} with {} register(s) produced no fields",
                starting_address,
                values.len()
            );
        }

        out.0
    }
}

#[derive(Default)]
struct Fields(FieldMap);

impl Fields {
    fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.0.insert(name.to_string(), value.into());
    }
}

fn tenths(raw: u16) -> f64 {
    f64::from(raw) / 10.0
}

fn hundredths(raw: u16) -> f64 {
    f64::from(raw) / 100.0
}

fn version(raw: u16) -> String {
    format!("{}.{}", raw >> 8, raw & 0xFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    fn block(len: usize, set: &[(usize, u16)]) -> Vec<u8> {
        let mut values = vec![0u16; len];
        for (index, value) in set {
            values[*index] = *value;
        }
        payload(&values)
    }

    #[test]
    fn test_core_block() {
        let raw = block(
            40,
            &[
                (0, u16::from_be_bytes(*b"AC")),
                (1, u16::from_be_bytes(*b"50")),
                (2, u16::from_be_bytes([b'0', 0])),
                (9, 0x0001),
                (11, 0x0203),
                (13, 0x0104),
                (15, 0x0209),
                (28, 420),
                (31, 1234),
                (33, 77),
                (38, 1),
            ],
        );

        let fields = Ac500Decoder.decode(10, &raw);

        assert_eq!(fields["device_type"], FieldValue::Text("AC500".into()));
        assert_eq!(fields["serial_number"], FieldValue::Int(0x0001_0203));
        assert_eq!(fields["arm_version"], FieldValue::Text("1.4".into()));
        assert_eq!(fields["dsp_version"], FieldValue::Text("2.9".into()));
        assert_eq!(fields["ac_output_power"], FieldValue::Int(420));
        assert_eq!(fields["power_generation"], FieldValue::Float(123.4));
        assert_eq!(fields["total_battery_percent"], FieldValue::Int(77));
        assert_eq!(fields["ac_output_on"], FieldValue::Bool(true));
        assert_eq!(fields["dc_output_on"], FieldValue::Bool(false));
    }

    #[test]
    fn test_core_block_too_short() {
        let fields = Ac500Decoder.decode(10, &block(39, &[(33, 77)]));
        assert!(fields.is_empty());
    }

    #[test]
    fn test_detailed_block() {
        let raw = block(21, &[(0, 1), (1, 2301), (4, 5000), (7, 2298), (19, 350)]);

        let fields = Ac500Decoder.decode(70, &raw);

        assert_eq!(fields["ac_output_mode"], FieldValue::Int(1));
        assert_eq!(fields["internal_ac_voltage"], FieldValue::Float(230.1));
        assert_eq!(fields["internal_ac_frequency"], FieldValue::Float(50.0));
        assert_eq!(fields["ac_input_voltage"], FieldValue::Float(229.8));
        assert_eq!(fields["ac_charging_power"], FieldValue::Int(350));
        assert_eq!(fields.len(), 15);
    }

    #[test]
    fn test_control_block_partial() {
        // Only the first two field groups fit.
        let raw = block(11, &[(0, 2), (5, 3), (6, 1), (10, 1)]);

        let fields = Ac500Decoder.decode(3001, &raw);

        let expected: FieldMap = [
            ("ups_mode", FieldValue::Int(2)),
            ("split_phase_on", FieldValue::Bool(false)),
            ("pack_num_configured", FieldValue::Int(3)),
            ("ac_output_on", FieldValue::Bool(true)),
            ("dc_output_on", FieldValue::Bool(false)),
            ("grid_charge_on", FieldValue::Bool(true)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        assert_eq!(fields, expected);
    }

    #[test]
    fn test_control_block_full() {
        let raw = block(
            61,
            &[
                (12, 1),
                (14, 20),
                (15, 95),
                (38, 1),
                (39, 0x1600),
                (55, 0x0600),
                (60, 4),
            ],
        );

        let fields = Ac500Decoder.decode(3001, &raw);

        assert_eq!(fields["time_control_on"], FieldValue::Bool(true));
        assert_eq!(fields["battery_range_start"], FieldValue::Int(20));
        assert_eq!(fields["battery_range_end"], FieldValue::Int(95));
        assert_eq!(fields["auto_sleep_mode"], FieldValue::Int(4));

        let programming = fields["time_control_programming"].as_registers().unwrap();
        assert_eq!(programming.len(), 18);
        assert_eq!(programming[&3039], 1);
        assert_eq!(programming[&3040], 0x1600);
        assert_eq!(programming[&3056], 0x0600);
    }

    #[test]
    fn test_pack_block() {
        let raw = block(37, &[(0, 6), (1, 532), (7, 5310), (8, 88)]);

        let fields = Ac500Decoder.decode(91, &raw);

        assert_eq!(fields["pack_num_max_bms"], FieldValue::Int(6));
        assert_eq!(fields["total_voltage"], FieldValue::Float(53.2));
        assert_eq!(fields["pack_voltage"], FieldValue::Float(53.1));
        assert_eq!(fields["battery_percent"], FieldValue::Int(88));
    }

    #[test]
    fn test_new_matches_default() {
        let raw = block(9, &[(8, 42)]);
        assert_eq!(
            Ac500Decoder::new().decode(91, &raw),
            Ac500Decoder::default().decode(91, &raw)
        );
    }

    #[test]
    fn test_unknown_block() {
        assert!(Ac500Decoder.decode(500, &block(10, &[(0, 1)])).is_empty());
        assert!(Ac500Decoder.decode(10, &[]).is_empty());
    }

    #[test]
    fn test_closure_decoder() {
        let decoder = |start: u16, payload: &[u8]| {
            let mut map = FieldMap::new();
            map.insert(format!("len_{}", start), FieldValue::Int(payload.len() as u64));
            map
        };

        let fields = decoder.decode(10, &[0, 1, 2, 3]);
        assert_eq!(fields["len_10"], FieldValue::Int(4));
    }
}
