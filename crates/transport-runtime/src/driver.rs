//! # Core Driver
//!
//! Runs a [`TransportCore`] on tokio: inputs arrive over an `mpsc` channel,
//! maintenance runs on a fixed interval and a `watch` channel stops the
//! loop. The core is only touched from the driver task, so per-peer events
//! are handled in delivery order.

use shared_types::{Address, Bandwidth, CheckId, PeerId, SendToken, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use transport_telemetry::{log_event, subsystem};

use tc_01_blacklist::ClientId;

use crate::container::TransportCore;

/// Default capacity of the input channel.
pub const DEFAULT_INPUT_CAPACITY: usize = 1024;

/// Everything the host can feed into the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreInput {
    /// Bytes from a plugin.
    Receive {
        address: Address,
        session: SessionId,
        data: Vec<u8>,
    },
    /// A plugin opened or accepted a session.
    SessionStart { address: Address, session: SessionId },
    /// A plugin lost a session.
    SessionEnd { address: Address, session: SessionId },
    /// A tokened send finished.
    SendComplete {
        token: SendToken,
        success: bool,
        bytes: usize,
    },
    /// Route selection picked an address.
    Suggestion {
        address: Address,
        session: Option<SessionId>,
        bandwidth_in: Bandwidth,
        bandwidth_out: Bandwidth,
    },
    /// A policy client connected.
    PolicyClientJoined(ClientId),
    /// A policy client went away.
    PolicyClientLeft(ClientId),
    /// A policy client answered a query.
    PolicyReply {
        client: ClientId,
        check: CheckId,
        allowed: bool,
    },
    /// A local client wants a connection.
    Connect(PeerId),
    /// A local client wants a disconnect.
    Disconnect { peer: PeerId, forced: bool },
}

/// Sending side of a running driver.
#[derive(Debug, Clone)]
pub struct CoreHandle {
    inputs: mpsc::Sender<CoreInput>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl CoreHandle {
    /// Queue an input, waiting for channel space.
    ///
    /// Returns `false` once the driver has stopped.
    pub async fn submit(&self, input: CoreInput) -> bool {
        self.inputs.send(input).await.is_ok()
    }

    /// Queue an input without waiting. Returns `false` if the channel is
    /// full or the driver has stopped.
    pub fn try_submit(&self, input: CoreInput) -> bool {
        self.inputs.try_send(input).is_ok()
    }

    /// Ask the driver to stop. The core is stopped (everyone disconnected)
    /// before the task ends.
    pub fn shutdown(&self) {
        // Nobody listening means the driver already ended.
        let _ = self.shutdown.send(true);
    }
}

/// Event loop around a [`TransportCore`].
pub struct CoreDriver {
    core: Arc<TransportCore>,
    tick_interval: Duration,
    inputs: mpsc::Receiver<CoreInput>,
    shutdown: watch::Receiver<bool>,
}

impl CoreDriver {
    /// Create a driver and the handle feeding it.
    pub fn new(
        core: Arc<TransportCore>,
        tick_interval: Duration,
        capacity: usize,
    ) -> (Self, CoreHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = Self {
            core,
            tick_interval,
            inputs: rx,
            shutdown: shutdown_rx,
        };
        let handle = CoreHandle {
            inputs: tx,
            shutdown: Arc::new(shutdown_tx),
        };
        (driver, handle)
    }

    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(
        core: Arc<TransportCore>,
        tick_interval: Duration,
    ) -> (CoreHandle, JoinHandle<()>) {
        let (driver, handle) = Self::new(core, tick_interval, DEFAULT_INPUT_CAPACITY);
        (handle, tokio::spawn(driver.run()))
    }

    /// Run until shutdown is requested or every handle is dropped.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log_event!(
            info,
            subsystem::RUNTIME,
            "Core driver started",
            tick_ms = self.tick_interval.as_millis() as u64
        );

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        log_event!(info, subsystem::RUNTIME, "Shutdown signal received");
                        break;
                    }
                }
                input = self.inputs.recv() => match input {
                    Some(input) => self.handle(input),
                    None => {
                        log_event!(info, subsystem::RUNTIME, "All core handles dropped");
                        break;
                    }
                },
                _ = interval.tick() => {
                    self.core.tick();
                }
            }
        }
        self.core.stop();
    }

    fn handle(&self, input: CoreInput) {
        let core = &self.core;
        match input {
            CoreInput::Receive {
                address,
                session,
                data,
            } => {
                // The delay is advisory for plugins reading on their own;
                // bytes pushed into the driver are already read.
                let _ = core.on_receive(&address, session, &data);
            }
            CoreInput::SessionStart { address, session } => {
                core.on_session_start(&address, session)
            }
            CoreInput::SessionEnd { address, session } => core.on_session_end(&address, session),
            CoreInput::SendComplete {
                token,
                success,
                bytes,
            } => core.on_send_complete(token, success, bytes),
            CoreInput::Suggestion {
                address,
                session,
                bandwidth_in,
                bandwidth_out,
            } => core.on_suggestion(&address, session, bandwidth_in, bandwidth_out),
            CoreInput::PolicyClientJoined(client) => {
                if let Err(e) = core.add_policy_client(client) {
                    log_event!(warn, subsystem::RUNTIME, "Policy client join failed", error = %e);
                }
            }
            CoreInput::PolicyClientLeft(client) => {
                if let Err(e) = core.remove_policy_client(client) {
                    log_event!(warn, subsystem::RUNTIME, "Policy client leave failed", error = %e);
                }
            }
            CoreInput::PolicyReply {
                client,
                check,
                allowed,
            } => {
                if let Err(e) = core.on_policy_reply(client, check, allowed) {
                    log_event!(debug, subsystem::RUNTIME, "Policy reply ignored", error = %e);
                }
            }
            CoreInput::Connect(peer) => {
                if let Err(e) = core.connect(&peer) {
                    log_event!(debug, subsystem::RUNTIME, "Connect refused", error = %e);
                }
            }
            CoreInput::Disconnect { peer, forced } => core.disconnect(&peer, forced),
        }
    }
}
