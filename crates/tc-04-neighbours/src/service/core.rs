use parking_lot::Mutex;
use shared_crypto::{PeerKeyPair, SignaturePurpose};
use shared_types::{
    Address, Bandwidth, CheckId, ClientEvent, DisconnectMessage, PeerId, SendRequest,
    SendToken, SessionId, SynMessage, Timestamp, TransportError, WireMessage,
};
use std::collections::HashMap;
use transport_telemetry::{log_event, log_peer_event, subsystem};

use crate::domain::{AddressSlot, InFlight, NeighbourConfig, NeighbourEntry, NeighbourState};
use crate::ports::NeighbourPorts;

/// What a pending blacklist check was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingCheck {
    /// A client asked to connect.
    TryConnect { peer: PeerId },
    /// The route-selection service suggested an address.
    Suggestion {
        peer: PeerId,
        generation: u64,
        address: Address,
        session: Option<SessionId>,
        bandwidth_in: Bandwidth,
        bandwidth_out: Bandwidth,
    },
    /// A new policy client joined; connected peers are asked about again.
    Recheck { peer: PeerId, generation: u64 },
}

impl PendingCheck {
    pub(crate) fn peer(&self) -> &PeerId {
        match self {
            Self::TryConnect { peer }
            | Self::Suggestion { peer, .. }
            | Self::Recheck { peer, .. } => peer,
        }
    }
}

/// Mutable state behind the service lock.
pub(crate) struct NeighbourTable {
    pub(crate) neighbours: HashMap<PeerId, NeighbourEntry>,
    pub(crate) next_generation: u64,
    pub(crate) next_token: u64,
    /// Sends handed to plugins, by token: owning peer and its generation.
    pub(crate) in_flight: HashMap<SendToken, (PeerId, u64)>,
    pub(crate) pending: HashMap<CheckId, PendingCheck>,
    pub(crate) last_util_report: Timestamp,
}

/// Neighbour state machine.
///
/// One [`NeighbourEntry`] per remote peer. The client API lives in
/// [`NeighbourApi`](crate::NeighbourApi), message and plugin callbacks in
/// [`NeighbourMessageHandler`](crate::NeighbourMessageHandler), deadlines
/// and periodic work in `poll`.
pub struct NeighbourService {
    pub(crate) config: NeighbourConfig,
    pub(crate) keypair: PeerKeyPair,
    pub(crate) local: PeerId,
    pub(crate) ports: NeighbourPorts,
    pub(crate) table: Mutex<NeighbourTable>,
}

impl NeighbourService {
    /// Create the service for the peer owning `keypair`.
    pub fn new(config: NeighbourConfig, keypair: PeerKeyPair, ports: NeighbourPorts) -> Self {
        let local = keypair.peer_id();
        let now = ports.time.now();
        log_event!(
            debug,
            subsystem::NEIGHBOURS,
            "Neighbour service created",
            local = %local
        );
        Self {
            config,
            keypair,
            local,
            ports,
            table: Mutex::new(NeighbourTable {
                neighbours: HashMap::new(),
                next_generation: 1,
                next_token: 0,
                in_flight: HashMap::new(),
                pending: HashMap::new(),
                last_util_report: now,
            }),
        }
    }

    /// Our peer identity.
    pub fn local_peer(&self) -> PeerId {
        self.local
    }

    /// Configuration in use.
    pub fn config(&self) -> &NeighbourConfig {
        &self.config
    }

    /// Number of neighbour entries, in any state.
    pub fn len(&self) -> usize {
        self.table.lock().neighbours.len()
    }

    /// No neighbour entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.ports.time.now()
    }

    /// Insert a fresh entry for `peer` in `NotConnected`.
    pub(crate) fn create_entry<'a>(
        &self,
        table: &'a mut NeighbourTable,
        peer: PeerId,
        now: Timestamp,
    ) -> &'a mut NeighbourEntry {
        let generation = table.next_generation;
        table.next_generation += 1;
        log_peer_event!(
            debug,
            subsystem::NEIGHBOURS,
            "New neighbour entry",
            peer,
            generation = generation
        );
        table
            .neighbours
            .entry(peer)
            .or_insert_with(|| NeighbourEntry::new(peer, generation, now, &self.config))
    }

    /// Enter `state` with deadline `timeout` and tell clients.
    pub(crate) fn set_state(
        &self,
        entry: &mut NeighbourEntry,
        state: NeighbourState,
        timeout: Timestamp,
    ) {
        entry.state = state;
        entry.timeout = timeout;
        let new = entry.kind();
        log_peer_event!(
            debug,
            subsystem::NEIGHBOURS,
            "Neighbour state changed",
            entry.peer,
            state = ?new,
            timeout = %timeout
        );
        let primary = entry.state.primary();
        self.ports.notifier.broadcast(ClientEvent::NeighbourChanged {
            peer: entry.peer,
            address: primary.map(|s| s.address.clone()),
            state: new,
            state_timeout: timeout,
        });
        let connected = new.is_connected();
        if connected && !entry.notified_connected {
            entry.notified_connected = true;
            self.ports.notifier.broadcast(ClientEvent::Connected {
                peer: entry.peer,
                bandwidth_out: primary.map_or(Bandwidth::ZERO, |s| s.bandwidth_out),
            });
        } else if !connected && entry.notified_connected {
            entry.notified_connected = false;
            self.ports
                .notifier
                .broadcast(ClientEvent::Disconnected { peer: entry.peer });
        }
    }

    /// Register `slot` with validation as in use.
    pub(crate) fn mark_in_use(&self, slot: &mut AddressSlot) {
        if !slot.in_use {
            slot.in_use = true;
            self.ports.usage.set_address_use(&slot.address, true);
        }
    }

    /// Single teardown path for an address slot.
    pub(crate) fn release_slot(&self, slot: AddressSlot, close_session: bool) {
        if slot.in_use {
            self.ports.usage.set_address_use(&slot.address, false);
        }
        if close_session {
            self.ports
                .transport
                .disconnect_session(&slot.address, slot.session);
        }
    }

    /// Release `old` after `kept` took its place. The session is closed
    /// unless `kept` still runs over it.
    pub(crate) fn release_replaced(&self, old: AddressSlot, kept: &AddressSlot) {
        let close_session = old.session != kept.session;
        self.release_slot(old, close_session);
    }

    /// Send a control message on `slot`.
    pub(crate) fn send_control(
        &self,
        slot: &AddressSlot,
        message: WireMessage,
    ) -> Result<(), TransportError> {
        let payload = message
            .encode()
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        self.ports.transport.send(SendRequest {
            address: slot.address.clone(),
            session: slot.session,
            payload,
            priority: self.config.control_priority,
            timeout: self.config.control_timeout,
            token: None,
        })
    }

    /// Send SYN on `slot`, stamping it. A failed send blocks the address.
    pub(crate) fn send_syn(&self, peer: &PeerId, slot: &mut AddressSlot, now: Timestamp) -> bool {
        slot.connect_timestamp = now;
        match self.send_control(slot, WireMessage::Syn(SynMessage::new(now))) {
            Ok(()) => {
                log_peer_event!(
                    debug,
                    subsystem::NEIGHBOURS,
                    "SYN sent",
                    peer,
                    address = %slot.address,
                    session = %slot.session
                );
                true
            }
            Err(e) => {
                log_peer_event!(
                    debug,
                    subsystem::NEIGHBOURS,
                    "SYN send failed",
                    peer,
                    address = %slot.address,
                    error = %e
                );
                self.ports
                    .registry
                    .block_address(&slot.address, Some(slot.session));
                false
            }
        }
    }

    /// Send SYN_ACK echoing `timestamp` on `slot`.
    pub(crate) fn send_syn_ack(&self, peer: &PeerId, slot: &AddressSlot, timestamp: Timestamp) -> bool {
        match self.send_control(slot, WireMessage::SynAck(SynMessage::new(timestamp))) {
            Ok(()) => true,
            Err(e) => {
                log_peer_event!(
                    debug,
                    subsystem::NEIGHBOURS,
                    "SYN_ACK send failed",
                    peer,
                    error = %e
                );
                false
            }
        }
    }

    /// Send ACK on `slot`.
    pub(crate) fn send_ack(&self, peer: &PeerId, slot: &AddressSlot) -> bool {
        match self.send_control(slot, WireMessage::Ack) {
            Ok(()) => true,
            Err(e) => {
                log_peer_event!(debug, subsystem::NEIGHBOURS, "ACK send failed", peer, error = %e);
                false
            }
        }
    }

    /// Signed DISCONNECT stamped `now`.
    pub(crate) fn disconnect_message(&self, now: Timestamp) -> DisconnectMessage {
        let body = DisconnectMessage::build_signed_body(now);
        let (signature, purpose_size) = self
            .keypair
            .sign_purpose(SignaturePurpose::Disconnect, &body);
        DisconnectMessage {
            reserved: 0,
            purpose_size,
            purpose: SignaturePurpose::Disconnect.code(),
            timestamp: now,
            public_key: *self.local.as_bytes(),
            signature: *signature.as_bytes(),
        }
    }

    /// Report a finished (or failed) client payload.
    pub(crate) fn send_complete(&self, peer: PeerId, receipt: u64, success: bool, bytes: usize) {
        self.ports.notifier.broadcast(ClientEvent::SendComplete {
            peer,
            receipt,
            success,
            bytes,
        });
    }

    /// Hand the next queued payload to the plugin, failing expired ones.
    pub(crate) fn try_transmission(&self, table: &mut NeighbourTable, peer: &PeerId, now: Timestamp) {
        let NeighbourTable {
            neighbours,
            in_flight,
            next_token,
            ..
        } = table;
        let Some(entry) = neighbours.get_mut(peer) else {
            return;
        };
        for message in entry.queue.take_expired(now) {
            log_peer_event!(
                debug,
                subsystem::NEIGHBOURS,
                "Queued message timed out",
                peer,
                receipt = message.receipt
            );
            self.send_complete(*peer, message.receipt, false, message.payload.len());
        }
        if !entry.state.is_connected() {
            return;
        }
        let Some(primary) = entry.state.primary() else {
            return;
        };
        while let Some(message) = entry.queue.next_ready() {
            *next_token += 1;
            let token = SendToken(*next_token);
            let bytes = message.payload.len();
            let request = SendRequest {
                address: primary.address.clone(),
                session: primary.session,
                payload: message.payload,
                priority: 0,
                timeout: message.timeout_at.remaining(now),
                token: Some(token),
            };
            match self.ports.transport.send(request) {
                Ok(()) => {
                    entry.queue.set_in_flight(InFlight {
                        token,
                        receipt: message.receipt,
                        bytes,
                    });
                    in_flight.insert(token, (*peer, entry.generation));
                    break;
                }
                Err(e) => {
                    log_peer_event!(
                        debug,
                        subsystem::NEIGHBOURS,
                        "Payload send failed",
                        peer,
                        receipt = message.receipt,
                        error = %e
                    );
                    self.send_complete(*peer, message.receipt, false, bytes);
                }
            }
        }
    }

    /// Remove `peer` entirely: fail its queue, release its slots, cancel its
    /// suggestions and pending checks.
    pub(crate) fn free_neighbour(&self, table: &mut NeighbourTable, peer: &PeerId, keep_sessions: bool) {
        let Some(mut entry) = table.neighbours.remove(peer) else {
            return;
        };
        let (primary, alternative) = entry.state.take_slots();
        self.set_state(&mut entry, NeighbourState::DisconnectFinished, self.now());

        let (in_flight, queued) = entry.queue.drain();
        if let Some(f) = in_flight {
            table.in_flight.remove(&f.token);
            self.send_complete(*peer, f.receipt, false, f.bytes);
        }
        for message in queued {
            self.send_complete(*peer, message.receipt, false, message.payload.len());
        }

        for slot in [primary, alternative].into_iter().flatten() {
            self.release_slot(slot, !keep_sessions);
        }
        if entry.suggestions_active {
            self.ports.registry.cancel_suggestions(peer);
        }
        let admission = &self.ports.admission;
        table.pending.retain(|check, pending| {
            if pending.peer() == peer {
                admission.cancel(*check);
                false
            } else {
                true
            }
        });
        log_peer_event!(
            debug,
            subsystem::NEIGHBOURS,
            "Neighbour freed",
            peer,
            generation = entry.generation
        );
    }

    /// Tear the connection down. Without `forced`, a signed DISCONNECT goes
    /// out on the primary first and the entry lingers briefly.
    pub(crate) fn disconnect_locked(
        &self,
        table: &mut NeighbourTable,
        peer: &PeerId,
        forced: bool,
        now: Timestamp,
    ) {
        let Some(entry) = table.neighbours.get_mut(peer) else {
            return;
        };
        if entry.kind().is_disconnecting() {
            return;
        }
        if forced || entry.state.primary().is_none() {
            self.free_neighbour(table, peer, false);
            return;
        }
        let (primary, alternative) = entry.state.take_slots();
        if let Some(alternative) = alternative {
            self.release_slot(alternative, true);
        }
        if let Some(slot) = &primary {
            let message = WireMessage::Disconnect(self.disconnect_message(now));
            if let Err(e) = self.send_control(slot, message) {
                log_peer_event!(
                    debug,
                    subsystem::NEIGHBOURS,
                    "DISCONNECT send failed",
                    peer,
                    error = %e
                );
            }
        }
        self.set_state(
            entry,
            NeighbourState::Disconnect { primary },
            now.saturating_add(self.config.disconnect_sent_timeout),
        );
    }
}
