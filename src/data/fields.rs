//! Named field values produced by the register decoder.

use std::collections::BTreeMap;
use std::fmt;

/// Flat map from field name to decoded value.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single decoded value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FieldValue {
    /// Raw register value or a composite integer (serial number).
    Int(u64),
    /// Scaled measurement, e.g. volts or hertz.
    Float(f64),
    /// On/off flag.
    Bool(bool),
    /// Text such as the device type or a firmware version.
    Text(String),
    /// A block of raw registers keyed by address.
    Registers(BTreeMap<u16, u16>),
}

impl FieldValue {
    /// Get the value as an integer, if it is one.
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a float. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get the value as a flag, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Get the register block, if this is one.
    pub fn as_registers(&self) -> Option<&BTreeMap<u16, u16>> {
        match self {
            Self::Registers(v) => Some(v),
            _ => None,
        }
    }
}

impl From<u16> for FieldValue {
    fn from(value: u16) -> Self {
        Self::Int(u64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
            Self::Registers(regs) => {
                write!(f, "{{")?;
                for (i, (address, value)) in regs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", address, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}
