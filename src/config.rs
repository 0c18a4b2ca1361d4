//! Client and polling configuration.
//!
//! Defaults match an AC500 with up to six B300/B300S battery packs.

use std::ops::RangeInclusive;
use std::time::Duration;

use crate::data::control::ControlRegister;
use crate::protocol::Command;

/// Timeouts for the blocking client.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    /// Upper bound for establishing the link.
    pub connect_timeout: Duration,
    /// Default per-command transaction timeout.
    pub command_timeout: Duration,
    /// Upper bound for an orderly disconnect.
    pub disconnect_timeout: Duration,
    /// Extra time a caller waits beyond an operation's own timeout, so the
    /// worker's result is normally seen instead of an abandoned wait.
    pub reply_grace: Duration,
}

impl ClientConfig {
    /// Default connect timeout (10 seconds).
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default command timeout (10 seconds).
    pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default disconnect timeout (10 seconds).
    pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default reply grace (500 ms).
    pub const DEFAULT_REPLY_GRACE: Duration = Duration::from_millis(500);

    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the disconnect timeout.
    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// Set the reply grace.
    pub fn with_reply_grace(mut self, grace: Duration) -> Self {
        self.reply_grace = grace;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            command_timeout: Self::DEFAULT_COMMAND_TIMEOUT,
            disconnect_timeout: Self::DEFAULT_DISCONNECT_TIMEOUT,
            reply_grace: Self::DEFAULT_REPLY_GRACE,
        }
    }
}

/// The battery-pack sub-protocol: select a slot, wait, read the pack window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackPlan {
    /// Register that selects which pack the pack window shows.
    pub select_register: u16,
    /// Slots to visit, in order. The device does not report which are populated.
    pub slots: RangeInclusive<u16>,
    /// Read that returns the selected pack's registers.
    pub read: Command,
    /// Time the device needs to switch its pack multiplexer.
    pub settle_delay: Duration,
    /// Fields that describe the whole system rather than one pack. They are
    /// merged without a slot prefix, first value wins.
    pub shared_fields: Vec<String>,
}

impl PackPlan {
    /// Number of pack slots on an AC500.
    pub const MAX_PACKS: u16 = 6;
    /// Default settle delay (1 second).
    pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

    /// Set the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the slots to visit.
    pub fn with_slots(mut self, slots: RangeInclusive<u16>) -> Self {
        self.slots = slots;
        self
    }
}

impl Default for PackPlan {
    fn default() -> Self {
        Self {
            select_register: ControlRegister::PackSelect.address(),
            slots: 1..=Self::MAX_PACKS,
            read: Command::read(91, 37),
            settle_delay: Self::DEFAULT_SETTLE_DELAY,
            shared_fields: vec!["pack_num_max_bms".to_string()],
        }
    }
}

/// What one poll cycle reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPlan {
    /// Register blocks read in order every cycle.
    pub reads: Vec<Command>,
    /// Optional pack sub-protocol, run after `reads`.
    pub pack: Option<PackPlan>,
    /// Timeout for each command of the cycle.
    pub command_timeout: Duration,
}

impl PollPlan {
    /// A plan with the given reads and no pack sub-protocol.
    pub fn new(reads: Vec<Command>) -> Self {
        Self {
            reads,
            pack: None,
            command_timeout: ClientConfig::DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Add the pack sub-protocol.
    pub fn with_pack(mut self, pack: PackPlan) -> Self {
        self.pack = Some(pack);
        self
    }

    /// Set the per-command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

impl Default for PollPlan {
    /// Core, detailed and control blocks, then all six pack slots.
    fn default() -> Self {
        Self::new(vec![
            Command::read(10, 40),
            Command::read(70, 21),
            Command::read(3001, 61),
        ])
        .with_pack(PackPlan::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.command_timeout, Duration::from_secs(10));
        assert_eq!(config.reply_grace, Duration::from_millis(500));
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_connect_timeout(Duration::from_secs(30))
            .with_command_timeout(Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.command_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_default_poll_plan() {
        let plan = PollPlan::default();
        assert_eq!(plan.reads.len(), 3);
        assert_eq!(plan.reads[0], Command::read(10, 40));

        let pack = plan.pack.expect("default plan polls packs");
        assert_eq!(pack.select_register, 3006);
        assert_eq!(pack.slots, 1..=6);
        assert_eq!(pack.read, Command::read(91, 37));
        assert_eq!(pack.settle_delay, Duration::from_secs(1));
    }
}
