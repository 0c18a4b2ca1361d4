//! Writable control registers and their typed values.

use std::fmt;

/// Holding registers in the control block that accept writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum ControlRegister {
    /// UPS working mode, see [`UpsMode`].
    UpsMode = 3001,
    /// AC output mode, see [`OutputMode`].
    AcOutputMode = 3002,
    /// Selects which battery pack the pack block (91..) reports.
    PackSelect = 3006,
    /// AC output on/off.
    AcOutput = 3007,
    /// DC output on/off.
    DcOutput = 3008,
    /// Charging from the grid on/off.
    GridCharge = 3011,
    /// Time-controlled charging on/off.
    TimeControl = 3013,
    /// Lower bound of the allowed state-of-charge range, in percent.
    BatteryRangeStart = 3015,
    /// Upper bound of the allowed state-of-charge range, in percent.
    BatteryRangeEnd = 3016,
    /// Auto sleep delay, see [`AutoSleepMode`].
    AutoSleep = 3061,
}

impl ControlRegister {
    /// The register address.
    pub fn address(&self) -> u16 {
        *self as u16
    }
}

/// UPS working mode (register 3001).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum UpsMode {
    /// Customized priorities set on the unit.
    Customized = 1,
    /// PV input takes priority.
    PvPriority = 2,
    /// Standard UPS operation.
    Standard = 3,
    /// Follows the time-control schedule.
    TimeControl = 4,
}

impl UpsMode {
    /// Create a UpsMode from a raw register value.
    pub fn from_raw(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Customized),
            2 => Some(Self::PvPriority),
            3 => Some(Self::Standard),
            4 => Some(Self::TimeControl),
            _ => None,
        }
    }

    /// Convert to raw register value.
    pub fn to_raw(&self) -> u16 {
        *self as u16
    }

    /// Human readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Customized => "Customized",
            Self::PvPriority => "PV Priority",
            Self::Standard => "Standard",
            Self::TimeControl => "Time Control",
        }
    }
}

impl fmt::Display for UpsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// AC output mode (register 3002, reported in register 70).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum OutputMode {
    /// Output off.
    Stop = 0,
    /// Inverter output.
    InverterOutput = 1,
    /// Bypass output C.
    BypassOutputC = 2,
    /// Bypass output D.
    BypassOutputD = 3,
    /// Load matching.
    LoadMatching = 4,
}

impl OutputMode {
    /// Create an OutputMode from a raw register value.
    pub fn from_raw(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Stop),
            1 => Some(Self::InverterOutput),
            2 => Some(Self::BypassOutputC),
            3 => Some(Self::BypassOutputD),
            4 => Some(Self::LoadMatching),
            _ => None,
        }
    }

    /// Convert to raw register value.
    pub fn to_raw(&self) -> u16 {
        *self as u16
    }

    /// Human readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stop => "Stop",
            Self::InverterOutput => "Inverter Output",
            Self::BypassOutputC => "Bypass Output C",
            Self::BypassOutputD => "Bypass Output D",
            Self::LoadMatching => "Load Matching",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Delay before the unit goes to sleep when idle (register 3061).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum AutoSleepMode {
    /// Sleep after 30 seconds idle.
    ThirtySeconds = 2,
    /// Sleep after one minute idle.
    OneMinute = 3,
    /// Sleep after five minutes idle.
    FiveMinutes = 4,
    /// Never sleep.
    Never = 5,
}

impl AutoSleepMode {
    /// Create an AutoSleepMode from a raw register value.
    pub fn from_raw(value: u16) -> Option<Self> {
        match value {
            2 => Some(Self::ThirtySeconds),
            3 => Some(Self::OneMinute),
            4 => Some(Self::FiveMinutes),
            5 => Some(Self::Never),
            _ => None,
        }
    }

    /// Convert to raw register value.
    pub fn to_raw(&self) -> u16 {
        *self as u16
    }

    /// Human readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ThirtySeconds => "30s",
            Self::OneMinute => "1min",
            Self::FiveMinutes => "5min",
            Self::Never => "Never",
        }
    }
}

impl fmt::Display for AutoSleepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
