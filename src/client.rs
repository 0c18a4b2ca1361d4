//! Blocking client facade.
//!
//! [`SyncClient`] runs the transport and transaction engine on a dedicated
//! worker thread with its own current-thread tokio runtime, and exposes
//! blocking `connect`/`disconnect`/`perform` to any number of caller threads.
//!
//! A session-wide lock serializes every call, so the worker executes at most
//! one operation at a time. Transaction failures (timeouts, bad frames, device
//! exceptions) are reported as `None` and leave the link up; any other error
//! tears the session down so the next session starts clean.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::ble::connection::{ConnectionState, StateCell};
use crate::ble::transport::Transport;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::Command;
use crate::transaction::TransactionEngine;

/// Name of the worker thread, as seen in logs and debuggers.
pub const WORKER_THREAD_NAME: &str = "bluetti-ble-worker";

/// How often a stopping worker is checked for completion.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Where the worker leaves the transport when it exits.
type Parking<T> = Arc<Mutex<Option<T>>>;

/// An operation submitted to the worker.
enum Request {
    Connect {
        timeout: Duration,
        reply: SyncSender<Result<()>>,
    },
    Disconnect {
        timeout: Duration,
        reply: SyncSender<Result<()>>,
    },
    Perform {
        command: Command,
        timeout: Duration,
        reply: SyncSender<Result<Vec<u8>>>,
    },
}

/// Handle to a running worker thread.
///
/// The worker owns the transport while it runs and parks it on exit, so a
/// worker that outlives its handle still returns the transport eventually.
struct Worker {
    requests: mpsc::UnboundedSender<Request>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn<T: Transport>(
        transport: T,
        parking: Parking<T>,
        shutdown_timeout: Duration,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build worker runtime: {}", e)))?;

        let (requests, receiver) = mpsc::unbounded_channel();
        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let transport = run_worker(runtime, transport, receiver, shutdown_timeout);
                *parking.lock() = Some(transport);
            })
            .map_err(|e| Error::Internal(format!("Failed to spawn worker thread: {}", e)))?;

        debug!("Worker thread started");
        Ok(Self { requests, handle })
    }

    /// Close the request channel and wait up to `wait` for the worker to exit.
    ///
    /// A worker still busy after `wait` is detached; it parks the transport
    /// when its current operation finishes.
    fn stop(self, wait: Duration) {
        let Worker { requests, handle } = self;
        drop(requests);

        let deadline = Instant::now() + wait;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("Worker still busy after {:?}; detaching it", wait);
                return;
            }
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }

        if handle.join().is_err() {
            error!("Worker thread panicked; transport is gone");
        }
    }

    /// Submit a request and block until its reply arrives or `wait` elapses.
    fn submit<R>(
        &self,
        request: impl FnOnce(SyncSender<Result<R>>) -> Request,
        wait: Duration,
    ) -> Result<R> {
        let (reply, response) = sync_channel(1);

        self.requests
            .send(request(reply))
            .map_err(|_| Error::Internal("Worker is not running".to_string()))?;

        match response.recv_timeout(wait) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Internal("Worker exited without replying".to_string()))
            }
        }
    }
}

fn run_worker<T: Transport>(
    runtime: Runtime,
    transport: T,
    mut requests: mpsc::UnboundedReceiver<Request>,
    shutdown_timeout: Duration,
) -> T {
    let mut engine = TransactionEngine::new(transport);

    runtime.block_on(async {
        let mut disconnect_attempted = false;

        while let Some(request) = requests.recv().await {
            disconnect_attempted = matches!(request, Request::Disconnect { .. });

            // A send error means the caller stopped waiting; nothing to do.
            match request {
                Request::Connect { timeout, reply } => {
                    let connect = engine.transport_mut().connect(timeout);
                    let result = bounded(timeout, connect, || Error::ConnectionFailed {
                        reason: format!("Timed out after {:?}", timeout),
                    })
                    .await;
                    let _ = reply.send(result);
                }
                Request::Disconnect { timeout, reply } => {
                    let disconnect = engine.transport_mut().disconnect();
                    let result = bounded(timeout, disconnect, || Error::Timeout).await;
                    let _ = reply.send(result);
                }
                Request::Perform {
                    command,
                    timeout,
                    reply,
                } => {
                    let result = engine.execute(&command, timeout).await;
                    let _ = reply.send(result);
                }
            }
        }

        // A disconnect that just failed is not retried on the way out.
        if !disconnect_attempted {
            engine.shutdown(shutdown_timeout).await;
        }
    });

    debug!("Worker thread stopping");
    engine.into_transport()
}

/// Run a link operation, failing with `elapsed()` if it outlasts `timeout`.
async fn bounded<F>(timeout: Duration, operation: F, elapsed: impl FnOnce() -> Error) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::time::timeout(timeout, operation)
        .await
        .unwrap_or_else(|_| Err(elapsed()))
}

/// Session data guarded by the session lock.
struct Session<T> {
    /// The transport while no worker owns it.
    parking: Parking<T>,
    worker: Option<Worker>,
}

/// Blocking, thread-safe client for one power station.
///
/// # Example
///
/// ```rust,no_run
/// use bluetti_rust_ble::{BleTransport, Command, SyncClient};
/// use std::time::Duration;
///
/// let address = "AC:50:00:12:34:56".parse().unwrap();
/// let client = SyncClient::new(BleTransport::new(address));
///
/// if client.connect(Duration::from_secs(10)) {
///     if let Some(payload) = client.perform(&Command::read(10, 40), Duration::from_secs(5)) {
///         println!("{} bytes", payload.len());
///     }
///     client.disconnect();
/// }
/// ```
pub struct SyncClient<T: Transport> {
    config: ClientConfig,
    state: StateCell,
    session: Mutex<Session<T>>,
}

impl<T: Transport> SyncClient<T> {
    /// Create a client with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    /// Create a client with a custom configuration.
    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        Self {
            config,
            state: StateCell::new(),
            session: Mutex::new(Session {
                parking: Arc::new(Mutex::new(Some(transport))),
                worker: None,
            }),
        }
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the current connection state without waiting for the session lock.
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Check if the session is connected.
    pub fn is_connected(&self) -> bool {
        self.state.get().is_connected()
    }

    /// Connect to the device, blocking up to `timeout` plus the reply grace.
    ///
    /// Returns `true` immediately if already connected. On failure the state
    /// is left `Disconnected` and the worker is stopped.
    pub fn connect(&self, timeout: Duration) -> bool {
        let mut session = self.session.lock();

        if self.state.get().is_connected() {
            return true;
        }

        self.state.transition(ConnectionState::Connecting);

        match self.connect_locked(&mut session, timeout) {
            Ok(()) => {
                self.state.transition(ConnectionState::Connected);
                info!("Session connected");
                true
            }
            Err(e) => {
                warn!("Connect failed: {}", e);
                self.stop_worker(&mut session);
                self.state.transition(ConnectionState::Disconnected);
                false
            }
        }
    }

    fn connect_locked(&self, session: &mut Session<T>, timeout: Duration) -> Result<()> {
        if session.worker.is_none() {
            let transport = session.parking.lock().take().ok_or_else(|| {
                Error::Internal("Transport is still held by a previous worker".to_string())
            })?;
            session.worker = Some(Worker::spawn(
                transport,
                session.parking.clone(),
                self.config.disconnect_timeout,
            )?);
        }

        let worker = session
            .worker
            .as_ref()
            .ok_or_else(|| Error::Internal("Worker is not running".to_string()))?;

        worker.submit(
            |reply| Request::Connect { timeout, reply },
            timeout + self.config.reply_grace,
        )
    }

    /// Disconnect from the device. A no-op unless connected.
    pub fn disconnect(&self) {
        let mut session = self.session.lock();
        self.disconnect_locked(&mut session);
    }

    fn disconnect_locked(&self, session: &mut Session<T>) {
        if !self.state.get().is_connected() {
            return;
        }

        self.state.transition(ConnectionState::Disconnecting);

        if let Some(worker) = session.worker.as_ref() {
            let timeout = self.config.disconnect_timeout;
            if let Err(e) = worker.submit(
                |reply| Request::Disconnect { timeout, reply },
                timeout + self.config.reply_grace,
            ) {
                warn!("Disconnect did not complete cleanly: {}", e);
            }
        }

        self.stop_worker(session);
        self.state.transition(ConnectionState::Disconnected);
        info!("Session disconnected");
    }

    /// Stop the worker, waiting at most the reply grace for it to exit.
    fn stop_worker(&self, session: &mut Session<T>) {
        if let Some(worker) = session.worker.take() {
            worker.stop(self.config.reply_grace);
        }
    }

    /// Execute `command`, blocking up to `timeout`, and return its payload.
    ///
    /// Returns `None` without touching the link if not connected, or if the
    /// transaction failed. Any other failure disconnects the session first.
    pub fn perform(&self, command: &Command, timeout: Duration) -> Option<Vec<u8>> {
        let mut session = self.session.lock();

        if !self.state.get().is_connected() {
            debug!("Not connected, skipping {}", command);
            return None;
        }

        let result = match session.worker.as_ref() {
            Some(worker) => worker.submit(
                |reply| Request::Perform {
                    command: *command,
                    timeout,
                    reply,
                },
                timeout + self.config.reply_grace,
            ),
            None => Err(Error::Internal("Worker is not running".to_string())),
        };

        match result {
            Ok(payload) => Some(payload),
            Err(e) if e.is_transaction_failure() => {
                warn!("{} failed: {}", command, e);
                None
            }
            Err(e) => {
                error!("Unexpected error during {}: {}; resetting session", command, e);
                self.disconnect_locked(&mut session);
                None
            }
        }
    }
}

impl<T: Transport> Drop for SyncClient<T> {
    fn drop(&mut self) {
        let mut session = self.session.lock();
        self.disconnect_locked(&mut session);
        self.stop_worker(&mut session);
    }
}
