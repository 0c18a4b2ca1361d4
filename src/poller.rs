//! Poll cycles over the blocking client.
//!
//! A cycle runs the plan's reads in order, then walks the battery-pack slots:
//! select the slot, wait for the device to switch, read the pack block. Each
//! step that fails is logged and skipped; the cycle always finishes.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ble::transport::Transport;
use crate::client::SyncClient;
use crate::config::{PackPlan, PollPlan};
use crate::data::control::{ControlRegister, OutputMode, UpsMode};
use crate::data::decoder::{Ac500Decoder, RegisterDecoder};
use crate::data::fields::FieldMap;
use crate::protocol::Command;

/// Runs poll cycles and control writes against one device.
pub struct Poller<T: Transport, D: RegisterDecoder = Ac500Decoder> {
    client: Arc<SyncClient<T>>,
    decoder: D,
    plan: PollPlan,
    fields: FieldMap,
    last_poll: Option<DateTime<Utc>>,
}

impl<T: Transport> Poller<T> {
    /// Create a poller for an AC500 with the default plan.
    pub fn new(client: Arc<SyncClient<T>>) -> Self {
        Self::with_decoder(client, Ac500Decoder, PollPlan::default())
    }
}

impl<T: Transport, D: RegisterDecoder> Poller<T, D> {
    /// Create a poller with a custom decoder and plan.
    pub fn with_decoder(client: Arc<SyncClient<T>>, decoder: D, plan: PollPlan) -> Self {
        Self {
            client,
            decoder,
            plan,
            fields: FieldMap::new(),
            last_poll: None,
        }
    }

    /// Get the client this poller drives.
    pub fn client(&self) -> &Arc<SyncClient<T>> {
        &self.client
    }

    /// Get the poll plan.
    pub fn plan(&self) -> &PollPlan {
        &self.plan
    }

    /// Connect using the client's configured connect timeout.
    pub fn connect(&self) -> bool {
        self.client.connect(self.client.config().connect_timeout)
    }

    /// Disconnect the client.
    pub fn disconnect(&self) {
        self.client.disconnect();
    }

    /// Fields from the most recent cycle.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// When the most recent cycle finished.
    pub fn last_poll(&self) -> Option<DateTime<Utc>> {
        self.last_poll
    }

    /// Run one poll cycle and return its fields.
    ///
    /// The previous cycle's fields are discarded first, so a field missing
    /// from the result was not read successfully in this cycle.
    pub fn poll(&mut self) -> &FieldMap {
        self.fields.clear();

        for command in &self.plan.reads {
            let Command::ReadHoldingRegisters { start, .. } = *command else {
                warn!("Skipping non-read command in poll plan: {}", command);
                continue;
            };

            match self.client.perform(command, self.plan.command_timeout) {
                Some(payload) => {
                    let decoded = self.decoder.decode(start, &payload);
                    debug!("{} decoded {} field(s)", command, decoded.len());
                    self.fields.extend(decoded);
                }
                None => warn!("Poll read {} failed", command),
            }
        }

        if let Some(pack) = &self.plan.pack {
            let pack_fields = self.poll_packs(pack);
            for (name, value) in pack_fields {
                self.fields.entry(name).or_insert(value);
            }
        }

        self.last_poll = Some(Utc::now());
        info!("Poll cycle complete: {} field(s)", self.fields.len());
        &self.fields
    }

    fn poll_packs(&self, pack: &PackPlan) -> FieldMap {
        let mut out = FieldMap::new();

        let Command::ReadHoldingRegisters { start, .. } = pack.read else {
            warn!("Pack plan read is not a register read: {}", pack.read);
            return out;
        };

        for slot in pack.slots.clone() {
            let select = Command::write(pack.select_register, slot);
            if self
                .client
                .perform(&select, self.plan.command_timeout)
                .is_none()
            {
                warn!("Could not select pack {}, skipping", slot);
                continue;
            }

            std::thread::sleep(pack.settle_delay);

            let Some(payload) = self.client.perform(&pack.read, self.plan.command_timeout) else {
                warn!("Could not read pack {}, skipping", slot);
                continue;
            };

            for (name, value) in self.decoder.decode(start, &payload) {
                if pack.shared_fields.contains(&name) {
                    out.entry(name).or_insert(value);
                } else {
                    out.insert(format!("pack_{}_{}", slot, name), value);
                }
            }
        }

        out
    }

    /// Write one holding register. Returns `true` if the device echoed it.
    pub fn send_write(&self, register: u16, value: u16) -> bool {
        let command = Command::write(register, value);
        let ok = self
            .client
            .perform(&command, self.client.config().command_timeout)
            .is_some();

        if ok {
            info!("Wrote {} = {}", register, value);
        } else {
            warn!("Write {} = {} failed", register, value);
        }
        ok
    }

    /// Switch AC output on or off.
    pub fn set_ac_output(&self, on: bool) -> bool {
        self.send_write(ControlRegister::AcOutput.address(), u16::from(on))
    }

    /// Switch DC output on or off.
    pub fn set_dc_output(&self, on: bool) -> bool {
        self.send_write(ControlRegister::DcOutput.address(), u16::from(on))
    }

    /// Allow or forbid charging from the grid.
    pub fn set_grid_charge(&self, on: bool) -> bool {
        self.send_write(ControlRegister::GridCharge.address(), u16::from(on))
    }

    /// Enable or disable time-controlled charging.
    pub fn set_time_control(&self, on: bool) -> bool {
        self.send_write(ControlRegister::TimeControl.address(), u16::from(on))
    }

    /// Select the UPS working mode.
    pub fn set_ups_mode(&self, mode: UpsMode) -> bool {
        self.send_write(ControlRegister::UpsMode.address(), mode.to_raw())
    }

    /// Select how the AC output is fed.
    pub fn set_ac_output_mode(&self, mode: OutputMode) -> bool {
        self.send_write(ControlRegister::AcOutputMode.address(), mode.to_raw())
    }
}
