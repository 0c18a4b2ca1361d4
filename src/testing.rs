//! Scripted transports and a fake device for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::ble::transport::Transport;
use crate::error::{Error, Result};
use crate::protocol::command::exceptions;
use crate::protocol::crc::append_crc;

/// Route log output to the test harness. Honors `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Something the scripted transport was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransportEvent {
    Connect,
    Disconnect,
    Write(Vec<u8>),
    /// The last queued chunk of a reply was handed out.
    Delivered,
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

/// A [`Transport`] that answers each written frame with scripted chunks.
pub(crate) struct ScriptedTransport {
    responder: Responder,
    pending: VecDeque<Vec<u8>>,
    connected: bool,
    fail_connect: bool,
    fail_writes: bool,
    drop_link_on_write: bool,
    chunk_delay: Duration,
    connect_delay: Duration,
    blocking_connect: Duration,
    disconnect_delay: Duration,
    log: Arc<Mutex<Vec<TransportEvent>>>,
}

impl ScriptedTransport {
    pub(crate) fn new(responder: impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            pending: VecDeque::new(),
            connected: false,
            fail_connect: false,
            fail_writes: false,
            drop_link_on_write: false,
            chunk_delay: Duration::ZERO,
            connect_delay: Duration::ZERO,
            blocking_connect: Duration::ZERO,
            disconnect_delay: Duration::ZERO,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A transport whose device never answers.
    pub(crate) fn silent() -> Self {
        Self::new(|_| Vec::new())
    }

    /// A transport backed by a [`FakeDevice`].
    pub(crate) fn device(device: FakeDevice) -> Self {
        let mut device = device;
        Self::new(move |frame| device.respond(frame))
    }

    /// Start out connected, as if `connect` already ran.
    pub(crate) fn connected(mut self) -> Self {
        self.connected = true;
        self
    }

    pub(crate) fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Let `connect` wait `delay` before doing anything.
    pub(crate) fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Block the calling thread for `delay` inside `connect`, stalling the
    /// whole runtime it runs on.
    pub(crate) fn with_blocking_connect(mut self, delay: Duration) -> Self {
        self.blocking_connect = delay;
        self
    }

    pub(crate) fn with_disconnect_delay(mut self, delay: Duration) -> Self {
        self.disconnect_delay = delay;
        self
    }

    pub(crate) fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub(crate) fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Lose the link right after the next write.
    pub(crate) fn dropping_link(mut self) -> Self {
        self.drop_link_on_write = true;
        self
    }

    /// Queue bytes that arrive before any request, e.g. a late reply.
    pub(crate) fn push_stale(&mut self, chunk: Vec<u8>) {
        self.pending.push_back(chunk);
    }

    pub(crate) fn log(&self) -> Arc<Mutex<Vec<TransportEvent>>> {
        self.log.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self, _timeout: Duration) -> Result<()> {
        self.log.lock().push(TransportEvent::Connect);
        if !self.blocking_connect.is_zero() {
            std::thread::sleep(self.blocking_connect);
        }
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if self.fail_connect {
            return Err(Error::ConnectionFailed {
                reason: "scripted failure".to_string(),
            });
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if !self.disconnect_delay.is_zero() {
            tokio::time::sleep(self.disconnect_delay).await;
        }
        if self.connected {
            self.log.lock().push(TransportEvent::Disconnect);
        }
        self.connected = false;
        self.pending.clear();
        Ok(())
    }

    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.log.lock().push(TransportEvent::Write(frame.to_vec()));
        if self.fail_writes {
            return Err(Error::ConnectionLost);
        }
        if self.drop_link_on_write {
            self.connected = false;
            return Ok(());
        }
        let chunks = (self.responder)(frame);
        self.pending.extend(chunks);
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        if !self.connected {
            return None;
        }

        match self.pending.pop_front() {
            Some(chunk) => {
                if !self.chunk_delay.is_zero() {
                    tokio::time::sleep(self.chunk_delay).await;
                }
                if self.pending.is_empty() {
                    self.log.lock().push(TransportEvent::Delivered);
                }
                Some(chunk)
            }
            None => std::future::pending::<Option<Vec<u8>>>().await,
        }
    }

    fn drain_stale(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Build a read-holding-registers response frame.
pub(crate) fn read_response(registers: &[u16]) -> Vec<u8> {
    let mut body = vec![0x01, 0x03, (registers.len() * 2) as u8];
    for value in registers {
        body.extend_from_slice(&value.to_be_bytes());
    }
    append_crc(&body)
}

/// Split a frame into chunks of at most `size` bytes.
pub(crate) fn chunked(frame: &[u8], size: usize) -> Vec<Vec<u8>> {
    frame.chunks(size.max(1)).map(<[u8]>::to_vec).collect()
}

/// An in-memory power station answering Modbus frames.
///
/// Pack registers are served from the bank selected by the last write to
/// `pack_select_register`.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeDevice {
    registers: HashMap<u16, u16>,
    packs: HashMap<u16, HashMap<u16, u16>>,
    pack_window: Option<(u16, u16)>,
    pack_select_register: u16,
    selected_pack: u16,
    silent_selects: HashSet<u16>,
    chunk_size: usize,
}

impl FakeDevice {
    pub(crate) fn new() -> Self {
        Self {
            pack_select_register: 3006,
            chunk_size: 20,
            ..Self::default()
        }
    }

    pub(crate) fn with_register(mut self, address: u16, value: u16) -> Self {
        self.registers.insert(address, value);
        self
    }

    /// Serve pack registers for `slot` in the window starting at `start`.
    pub(crate) fn with_pack(mut self, slot: u16, start: u16, values: &[u16]) -> Self {
        let end = start + values.len() as u16;
        self.pack_window = Some((start, end.max(self.pack_window.map_or(0, |w| w.1))));
        let bank = self.packs.entry(slot).or_default();
        for (offset, value) in values.iter().enumerate() {
            bank.insert(start + offset as u16, *value);
        }
        self
    }

    /// Never answer a pack-select write for `slot`.
    pub(crate) fn with_silent_select(mut self, slot: u16) -> Self {
        self.silent_selects.insert(slot);
        self
    }

    pub(crate) fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub(crate) fn respond(&mut self, frame: &[u8]) -> Vec<Vec<u8>> {
        if frame.len() < 8 {
            return Vec::new();
        }

        let function = frame[1];
        let address = u16::from_be_bytes([frame[2], frame[3]]);
        let operand = u16::from_be_bytes([frame[4], frame[5]]);

        let reply = match function {
            0x06 => {
                if address == self.pack_select_register {
                    if self.silent_selects.contains(&operand) {
                        return Vec::new();
                    }
                    self.selected_pack = operand;
                } else {
                    self.registers.insert(address, operand);
                }
                frame.to_vec()
            }
            0x03 => match self.read(address, operand) {
                Some(values) => read_response(&values),
                None => append_crc(&[0x01, 0x83, exceptions::ILLEGAL_DATA_ADDRESS]),
            },
            _ => append_crc(&[0x01, function | 0x80, exceptions::ILLEGAL_FUNCTION]),
        };

        chunked(&reply, self.chunk_size)
    }

    fn read(&self, start: u16, quantity: u16) -> Option<Vec<u16>> {
        let in_pack_window = self
            .pack_window
            .map_or(false, |(lo, hi)| start >= lo && start < hi);

        if in_pack_window {
            let bank = self.packs.get(&self.selected_pack)?;
            return Some(
                (start..start + quantity)
                    .map(|a| bank.get(&a).copied().unwrap_or(0))
                    .collect(),
            );
        }

        Some(
            (start..start + quantity)
                .map(|a| self.registers.get(&a).copied().unwrap_or(0))
                .collect(),
        )
    }
}
