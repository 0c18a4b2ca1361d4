//! Decoded device data.
//!
//! Register blocks read from the power station are turned into a flat map of
//! named fields. This module holds the field types, the register decoder and
//! the typed control values written back to the device.

pub mod control;
pub mod decoder;
pub mod fields;
pub mod schedule;

pub use control::{AutoSleepMode, ControlRegister, OutputMode, UpsMode};
pub use decoder::{Ac500Decoder, RegisterDecoder};
pub use fields::{FieldMap, FieldValue};
pub use schedule::{transition_times, TimeOfDay};
