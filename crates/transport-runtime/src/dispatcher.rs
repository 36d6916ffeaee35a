//! # Dispatcher
//!
//! Entry points the host calls: bytes from plugins, session changes, send
//! completions, route-selection suggestions, policy-client traffic and the
//! maintenance tick. Each is routed to the subsystem that owns it.
//!
//! Blacklist verdicts are produced inside the gate and delivered here: every
//! entry point that can complete a check pumps verdicts before returning.

use shared_types::{
    Address, AddressProperties, AddressRegistry, AdmissionControl, Bandwidth, CheckId,
    ClientEvent, ClientNotifier, PeerId, SendToken, SessionId, Timestamp, WireMessage,
};
use std::time::Duration;
use transport_telemetry::{log_event, log_peer_event, subsystem};

use tc_01_blacklist::{BlacklistApi, ClientId};
use tc_03_address_validation::{AddressValidationApi, ValidationMessageHandler};
use tc_04_neighbours::{NeighbourApi, NeighbourError, NeighbourMessageHandler};

use crate::container::TransportCore;
use crate::errors::DispatchError;

/// Counts from one maintenance tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Blocked addresses handed back to route selection.
    pub unblocked: usize,
    /// Validation entries acted on.
    pub validation: usize,
    /// Neighbour deadlines that fired.
    pub neighbour_deadlines: usize,
    /// Blacklist verdicts delivered.
    pub verdicts: usize,
}

impl TransportCore {
    // =========================================================================
    // PLUGIN CALLBACKS
    // =========================================================================

    /// Bytes arrived on `session`. Returns how long the plugin should wait
    /// before reading from this session again.
    pub fn on_receive(&self, address: &Address, session: SessionId, data: &[u8]) -> Duration {
        let peer = address.peer;
        let mut buf = data;
        let mut delay = Duration::ZERO;
        while !buf.is_empty() {
            let (message, used) = match WireMessage::decode(buf) {
                Ok(decoded) => decoded,
                Err(e) => {
                    log_peer_event!(
                        debug,
                        subsystem::RUNTIME,
                        "Dropping undecodable data",
                        peer,
                        error = %e,
                        bytes = buf.len()
                    );
                    break;
                }
            };
            let raw = &buf[..used];
            buf = &buf[used..];
            let msg_type = message.msg_type();
            match self.dispatch(address, session, message, raw) {
                Ok(wait) => delay = delay.max(wait),
                Err(e) => log_peer_event!(
                    debug,
                    subsystem::RUNTIME,
                    "Message rejected",
                    peer,
                    msg_type = msg_type,
                    error = %e
                ),
            }
        }
        self.pump_verdicts();
        delay
    }

    /// Route one decoded message.
    fn dispatch(
        &self,
        address: &Address,
        session: SessionId,
        message: WireMessage,
        raw: &[u8],
    ) -> Result<Duration, DispatchError> {
        let peer = &address.peer;
        match message {
            WireMessage::Hello(hello) => {
                self.validation.handle_hello(&hello);
            }
            WireMessage::Ping(ping) => {
                self.validation
                    .handle_ping(peer, &ping, address, Some(session))?;
            }
            WireMessage::Pong(pong) => self.validation.handle_pong(peer, &pong)?,
            WireMessage::Syn(syn) => self.neighbours.handle_syn(peer, &syn)?,
            WireMessage::SynAck(syn) => {
                self.neighbours
                    .handle_syn_ack(peer, &syn, address, session)?;
            }
            WireMessage::Ack => self.neighbours.handle_ack(peer, address, session)?,
            WireMessage::Disconnect(message) => {
                self.neighbours.handle_disconnect_message(peer, &message)?;
            }
            WireMessage::Keepalive { nonce } => self.neighbours.handle_keepalive(peer, nonce)?,
            WireMessage::KeepaliveResponse { nonce } => {
                self.neighbours.handle_keepalive_response(peer, nonce)?;
            }
            WireMessage::Quota { bytes_per_sec } => {
                self.neighbours.handle_quota(peer, bytes_per_sec)?;
            }
            WireMessage::Payload { .. } => return self.deliver(peer, raw),
        }
        Ok(Duration::ZERO)
    }

    /// Hand an application message to local clients, subject to the
    /// inbound quota.
    fn deliver(&self, peer: &PeerId, raw: &[u8]) -> Result<Duration, DispatchError> {
        if !self.neighbours.is_connected(peer) {
            return Err(NeighbourError::NotConnected.into());
        }
        let verdict = self.neighbours.on_inbound_data(peer, raw.len());
        if verdict.forward {
            self.clients.broadcast(ClientEvent::Received {
                peer: *peer,
                payload: raw.to_vec(),
            });
        }
        Ok(verdict.delay)
    }

    /// A plugin opened or accepted `session`.
    pub fn on_session_start(&self, address: &Address, session: SessionId) {
        log_peer_event!(
            debug,
            subsystem::RUNTIME,
            "Session started",
            address.peer,
            address = %address,
            session = %session
        );
        if address.inbound {
            let props = AddressProperties {
                network: self.transport.network_type(address, session),
                ..AddressProperties::default()
            };
            self.ats.add_inbound(address, session, props);
        } else {
            self.ats.new_session(address, session);
        }
    }

    /// A plugin lost `session`.
    pub fn on_session_end(&self, address: &Address, session: SessionId) {
        log_peer_event!(
            debug,
            subsystem::RUNTIME,
            "Session ended",
            address.peer,
            address = %address,
            session = %session
        );
        self.blacklist.abort_matching(address, Some(session));
        self.ats.del_session(address, session);
        self.neighbours.on_session_terminated(&address.peer, session);
        self.pump_verdicts();
    }

    /// A send carrying `token` finished.
    pub fn on_send_complete(&self, token: SendToken, success: bool, bytes: usize) {
        self.neighbours.on_send_complete(token, success, bytes);
    }

    // =========================================================================
    // ROUTE SELECTION
    // =========================================================================

    /// Route selection picked `address` (and bandwidth) for its peer.
    pub fn on_suggestion(
        &self,
        address: &Address,
        session: Option<SessionId>,
        bandwidth_in: Bandwidth,
        bandwidth_out: Bandwidth,
    ) {
        self.neighbours
            .on_address_suggestion(address, session, bandwidth_in, bandwidth_out);
        self.pump_verdicts();
    }

    // =========================================================================
    // POLICY CLIENTS
    // =========================================================================

    /// A policy client connected. Connected neighbours are checked again.
    pub fn add_policy_client(&self, client: ClientId) -> Result<(), DispatchError> {
        self.blacklist.add_client(client)?;
        let denied = self.neighbours.recheck_blacklist();
        log_event!(
            info,
            subsystem::RUNTIME,
            "Policy client joined",
            client = client.0,
            denied = denied
        );
        self.pump_verdicts();
        Ok(())
    }

    /// A policy client went away.
    pub fn remove_policy_client(&self, client: ClientId) -> Result<(), DispatchError> {
        self.blacklist.remove_client(client)?;
        self.pump_verdicts();
        Ok(())
    }

    /// A policy client answered.
    pub fn on_policy_reply(
        &self,
        client: ClientId,
        check: CheckId,
        allowed: bool,
    ) -> Result<(), DispatchError> {
        self.blacklist.on_client_reply(client, check, allowed)?;
        self.pump_verdicts();
        Ok(())
    }

    /// Deliver every verdict the gate produced to the subsystem that asked.
    pub fn pump_verdicts(&self) -> usize {
        let mut delivered = 0;
        // A verdict can start new checks whose verdicts are immediate.
        loop {
            let verdicts = self.blacklist.drain_verdicts();
            if verdicts.is_empty() {
                return delivered;
            }
            for (check, verdict) in verdicts {
                delivered += 1;
                if !self.neighbours.on_blacklist_verdict(check, verdict)
                    && !self.validation.on_blacklist_verdict(check, verdict)
                {
                    log_event!(
                        trace,
                        subsystem::RUNTIME,
                        "Verdict for a check nobody waits for",
                        check = check.0,
                        verdict = ?verdict
                    );
                }
            }
        }
    }

    // =========================================================================
    // CLIENT API
    // =========================================================================

    /// Ask for a connection to `peer`.
    pub fn connect(&self, peer: &PeerId) -> Result<(), DispatchError> {
        self.neighbours.try_connect(peer)?;
        self.pump_verdicts();
        Ok(())
    }

    /// Disconnect `peer`.
    pub fn disconnect(&self, peer: &PeerId, forced: bool) {
        self.neighbours.disconnect(peer, forced);
    }

    /// Queue an application message (header included) for `peer`.
    pub fn send(
        &self,
        peer: &PeerId,
        payload: Vec<u8>,
        timeout: Duration,
        receipt: u64,
    ) -> Result<(), DispatchError> {
        Ok(self.neighbours.send(peer, payload, timeout, receipt)?)
    }

    /// Register one of our own addresses for validation.
    pub fn add_own_address(&self, transport: &str, raw: &[u8]) -> bool {
        self.validation.add_own_address(transport, raw)
    }

    /// Learn an address of another peer.
    pub fn add_peer_address(&self, address: &Address, expiration: Timestamp) -> bool {
        let added = self.validation.handle_address(address, expiration);
        self.pump_verdicts();
        added
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Periodic work of every subsystem.
    pub fn tick(&self) -> TickReport {
        let mut report = TickReport {
            verdicts: self.pump_verdicts(),
            ..TickReport::default()
        };
        report.unblocked = self.ats.poll_unblock();
        report.validation = self.validation.poll();
        report.neighbour_deadlines = self.neighbours.poll();
        report.verdicts += self.pump_verdicts();
        log_event!(trace, subsystem::RUNTIME, "Tick", report = ?report);
        report
    }

    /// Disconnect everyone and drop all validation state.
    pub fn stop(&self) {
        let neighbours = self.neighbours.stop();
        let entries = self.validation.stop();
        log_event!(
            info,
            subsystem::RUNTIME,
            "Transport core stopped",
            neighbours = neighbours,
            validation_entries = entries
        );
    }
}
