//! Time-control schedule registers.
//!
//! Times of day are stored as `hours * 256 + minutes` in a single register.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// First register of the time-control programming block.
pub const SCHEDULE_START: u16 = 3039;
/// Last register of the time-control programming block.
pub const SCHEDULE_END: u16 = 3056;

/// A wall-clock time decoded from a schedule register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeOfDay {
    /// Hour of the day, 0 to 23.
    pub hours: u8,
    /// Minute of the hour, 0 to 59.
    pub minutes: u8,
}

impl TimeOfDay {
    /// Create a time of day.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `hours > 23` or `minutes > 59`.
    pub fn new(hours: u8, minutes: u8) -> Result<Self> {
        Self::from_raw(u16::from_be_bytes([hours, minutes])).ok_or_else(|| {
            Error::InvalidParameter {
                name: "time_of_day".to_string(),
                value: format!("{}:{}", hours, minutes),
            }
        })
    }

    /// Decode a register value. Returns `None` for out-of-range times.
    pub fn from_raw(value: u16) -> Option<Self> {
        let [hours, minutes] = value.to_be_bytes();
        if hours > 23 || minutes > 59 {
            return None;
        }
        Some(Self { hours, minutes })
    }

    /// Encode back to a register value.
    pub fn to_raw(&self) -> u16 {
        (u16::from(self.hours) << 8) | u16::from(self.minutes)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hours, self.minutes)
    }
}

/// Sorted, distinct transition times in a time-control register block.
///
/// Small values in the block are flags and counters rather than times; only
/// values above 256 (later than 01:00) are treated as transitions, and
/// values that are not a valid time of day are skipped.
pub fn transition_times(registers: &BTreeMap<u16, u16>) -> Vec<TimeOfDay> {
    let mut times: Vec<TimeOfDay> = registers
        .range(SCHEDULE_START..=SCHEDULE_END)
        .map(|(_, value)| *value)
        .filter(|value| *value > 256)
        .filter_map(TimeOfDay::from_raw)
        .collect();
    times.sort();
    times.dedup();
    times
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_from_raw() {
        let t = TimeOfDay::from_raw(7 * 256 + 30).unwrap();
        assert_eq!((t.hours, t.minutes), (7, 30));
        assert_eq!(t.to_string(), "07:30");
        assert_eq!(t.to_raw(), 7 * 256 + 30);

        assert_eq!(TimeOfDay::from_raw(0).unwrap().to_string(), "00:00");
        assert_eq!(TimeOfDay::from_raw(24 * 256), None);
        assert_eq!(TimeOfDay::from_raw(60), None);
    }

    #[test]
    fn test_time_of_day_new() {
        assert_eq!(TimeOfDay::new(22, 0).unwrap().to_raw(), 22 * 256);
        assert!(matches!(
            TimeOfDay::new(24, 0),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_transition_times() {
        let registers = BTreeMap::from([
            (3039, 1),
            (3040, 22 * 256),
            (3041, 6 * 256 + 15),
            (3042, 22 * 256),
            (3043, 0xFFFF),
            (3057, 12 * 256),
        ]);

        let times: Vec<String> = transition_times(&registers)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(times, vec!["06:15", "22:00"]);
    }
}
