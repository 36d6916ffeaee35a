use shared_types::{
    wire::HEADER_SIZE, Address, AddressProperties, Admission, AdmissionRequest, Bandwidth,
    ClientEvent, ConnectionState, PeerId, SessionId, Timestamp, WireMessage,
};
use std::time::Duration;
use transport_telemetry::{log_peer_event, subsystem};

use super::core::{NeighbourTable, PendingCheck};
use crate::domain::{
    AckState, AddressSlot, NeighbourError, NeighbourInfo, NeighbourState, QueuedMessage,
};
use crate::ports::NeighbourApi;
use crate::service::NeighbourService;

impl NeighbourService {
    /// Create the entry for an allowed connect request and ask for
    /// addresses.
    pub(crate) fn start_connect(&self, table: &mut NeighbourTable, peer: PeerId, now: Timestamp) {
        if table.neighbours.contains_key(&peer) {
            return;
        }
        let timeout = now.saturating_add(self.config.ats_response_timeout);
        let entry = self.create_entry(table, peer, now);
        self.set_state(entry, NeighbourState::InitAts, timeout);
        entry.suggestions_active = true;
        self.ports.registry.request_suggestions(&peer);
    }

    /// Put an admitted address suggestion to use.
    pub(crate) fn apply_suggestion(
        &self,
        table: &mut NeighbourTable,
        address: &Address,
        session: Option<SessionId>,
        bandwidth_in: Bandwidth,
        bandwidth_out: Bandwidth,
        now: Timestamp,
    ) {
        let peer = address.peer;
        let Some(kind) = table.neighbours.get(&peer).map(|e| e.kind()) else {
            return;
        };
        if kind.is_disconnecting() {
            return;
        }
        let Some(session) = session.or_else(|| self.ports.transport.get_session(address)) else {
            log_peer_event!(
                debug,
                subsystem::NEIGHBOURS,
                "No session for suggested address",
                peer,
                address = %address
            );
            self.ports.registry.block_address(address, None);
            return;
        };
        if address.inbound {
            if !self.ports.registry.is_known(address, Some(session)) {
                self.ports
                    .registry
                    .add_inbound(address, session, AddressProperties::default());
            }
        } else if self.ports.registry.is_known(address, None) {
            self.ports.registry.new_session(address, session);
        }

        let Some(entry) = table.neighbours.get_mut(&peer) else {
            return;
        };
        let mut slot = AddressSlot::new(address.clone(), session, bandwidth_in, bandwidth_out);
        let setup = now.saturating_add(self.config.setup_connection_timeout);
        let state = std::mem::replace(&mut entry.state, NeighbourState::NotConnected);
        let timeout = entry.timeout;

        let (next, deadline) = match state {
            NeighbourState::NotConnected | NeighbourState::InitAts => {
                entry.in_tracker.update_quota(now, bandwidth_in);
                self.mark_in_use(&mut slot);
                if self.send_syn(&peer, &mut slot, now) {
                    (NeighbourState::SynSent { primary: slot }, setup)
                } else {
                    self.release_slot(slot, false);
                    (
                        NeighbourState::InitAts,
                        now.saturating_add(self.config.ats_response_timeout),
                    )
                }
            }
            NeighbourState::SynSent { primary } => {
                self.release_replaced(primary, &slot);
                entry.in_tracker.update_quota(now, bandwidth_in);
                self.mark_in_use(&mut slot);
                if self.send_syn(&peer, &mut slot, now) {
                    (NeighbourState::SynSent { primary: slot }, setup)
                } else {
                    self.release_slot(slot, false);
                    (
                        NeighbourState::InitAts,
                        now.saturating_add(self.config.ats_response_timeout),
                    )
                }
            }
            NeighbourState::SynRecvAts => {
                entry.in_tracker.update_quota(now, bandwidth_in);
                self.mark_in_use(&mut slot);
                if self.send_syn_ack(&peer, &slot, entry.connect_ack_timestamp) {
                    entry.ack_state = AckState::Undefined;
                }
                (NeighbourState::SynRecvAck { primary: slot }, setup)
            }
            NeighbourState::SynRecvAck { primary } => {
                self.release_replaced(primary, &slot);
                entry.in_tracker.update_quota(now, bandwidth_in);
                self.mark_in_use(&mut slot);
                if self.send_syn_ack(&peer, &slot, entry.connect_ack_timestamp) {
                    entry.ack_state = AckState::Undefined;
                }
                (NeighbourState::SynRecvAck { primary: slot }, setup)
            }
            NeighbourState::Connected { primary } => {
                if self.send_syn(&peer, &mut slot, now) {
                    (
                        NeighbourState::SwitchSynSent {
                            primary,
                            alternative: slot,
                        },
                        setup,
                    )
                } else {
                    (NeighbourState::Connected { primary }, timeout)
                }
            }
            NeighbourState::ReconnectAts => {
                entry.in_tracker.update_quota(now, bandwidth_in);
                self.mark_in_use(&mut slot);
                if self.send_syn(&peer, &mut slot, now) {
                    (
                        NeighbourState::ReconnectSent { primary: slot },
                        now.saturating_add(self.config.fast_reconnect_timeout),
                    )
                } else {
                    self.release_slot(slot, false);
                    (NeighbourState::ReconnectAts, timeout)
                }
            }
            NeighbourState::ReconnectSent { primary } => {
                self.release_replaced(primary, &slot);
                entry.in_tracker.update_quota(now, bandwidth_in);
                self.mark_in_use(&mut slot);
                if self.send_syn(&peer, &mut slot, now) {
                    (
                        NeighbourState::ReconnectSent { primary: slot },
                        now.saturating_add(self.config.fast_reconnect_timeout),
                    )
                } else {
                    self.release_slot(slot, false);
                    (
                        NeighbourState::ReconnectAts,
                        now.saturating_add(self.config.ats_response_timeout),
                    )
                }
            }
            NeighbourState::SwitchSynSent {
                primary,
                alternative,
            } => {
                let close_session =
                    alternative.session != slot.session && alternative.session != primary.session;
                self.release_slot(alternative, close_session);
                if self.send_syn(&peer, &mut slot, now) {
                    (
                        NeighbourState::SwitchSynSent {
                            primary,
                            alternative: slot,
                        },
                        setup,
                    )
                } else {
                    (
                        NeighbourState::Connected { primary },
                        now.saturating_add(self.config.idle_connection_timeout),
                    )
                }
            }
            state @ (NeighbourState::Disconnect { .. } | NeighbourState::DisconnectFinished) => {
                (state, timeout)
            }
        };
        self.set_state(entry, next, deadline);
    }

    /// Refresh bandwidth of the primary in place.
    fn update_bandwidth(
        &self,
        table: &mut NeighbourTable,
        peer: &PeerId,
        bandwidth_in: Bandwidth,
        bandwidth_out: Bandwidth,
        now: Timestamp,
    ) {
        if bandwidth_in.is_zero() {
            log_peer_event!(
                debug,
                subsystem::NEIGHBOURS,
                "Inbound quota withdrawn",
                peer
            );
            self.disconnect_locked(table, peer, false, now);
            return;
        }
        let Some(entry) = table.neighbours.get_mut(peer) else {
            return;
        };
        let receive_quota = entry.neighbour_receive_quota;
        let Some(primary) = entry.state.primary_mut() else {
            return;
        };
        if primary.bandwidth_in != bandwidth_in {
            primary.bandwidth_in = bandwidth_in;
            let message = WireMessage::Quota {
                bytes_per_sec: bandwidth_in.bytes_per_sec(),
            };
            if let Err(e) = self.send_control(primary, message) {
                log_peer_event!(debug, subsystem::NEIGHBOURS, "QUOTA send failed", peer, error = %e);
            }
            entry.in_tracker.update_quota(now, bandwidth_in);
        }
        if primary.bandwidth_out != bandwidth_out {
            primary.bandwidth_out = bandwidth_out;
            self.ports.notifier.broadcast(ClientEvent::QuotaAdvisory {
                peer: *peer,
                bandwidth_out: receive_quota.min(bandwidth_out),
            });
        }
    }
}

impl NeighbourApi for NeighbourService {
    fn try_connect(&self, peer: &PeerId) -> Result<(), NeighbourError> {
        if *peer == self.local {
            return Err(NeighbourError::SelfConnect);
        }
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;
        if let Some(entry) = table.neighbours.get(peer) {
            if !entry.kind().is_disconnecting() {
                return Ok(());
            }
            self.free_neighbour(table, peer, false);
        }
        if table
            .pending
            .values()
            .any(|p| matches!(p, PendingCheck::TryConnect { peer: waiting } if waiting == peer))
        {
            return Ok(());
        }
        match self.ports.admission.test_allowed(AdmissionRequest::peer(*peer)) {
            Admission::Allowed => self.start_connect(table, *peer, now),
            Admission::Denied => {
                log_peer_event!(
                    debug,
                    subsystem::NEIGHBOURS,
                    "Connect request denied by blacklist",
                    peer
                );
            }
            Admission::Pending(check) => {
                table
                    .pending
                    .insert(check, PendingCheck::TryConnect { peer: *peer });
            }
        }
        Ok(())
    }

    fn on_address_suggestion(
        &self,
        address: &Address,
        session: Option<SessionId>,
        bandwidth_in: Bandwidth,
        bandwidth_out: Bandwidth,
    ) {
        let peer = address.peer;
        if peer == self.local {
            return;
        }
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;
        let Some(entry) = table.neighbours.get(&peer) else {
            log_peer_event!(
                trace,
                subsystem::NEIGHBOURS,
                "Suggestion for unknown neighbour",
                peer,
                address = %address
            );
            return;
        };
        if entry.kind().is_disconnecting() {
            return;
        }
        if bandwidth_in.is_zero() && bandwidth_out.is_zero() {
            log_peer_event!(
                debug,
                subsystem::NEIGHBOURS,
                "Route selection withdrew all bandwidth",
                peer
            );
            self.disconnect_locked(table, &peer, false, now);
            return;
        }
        let same_primary = entry
            .state
            .primary()
            .is_some_and(|p| p.address == *address && session.map_or(true, |s| s == p.session));
        if same_primary {
            self.update_bandwidth(table, &peer, bandwidth_in, bandwidth_out, now);
            return;
        }
        let generation = entry.generation;

        match self
            .ports
            .admission
            .test_allowed(AdmissionRequest::address(address, session))
        {
            Admission::Allowed => {
                self.apply_suggestion(table, address, session, bandwidth_in, bandwidth_out, now)
            }
            Admission::Denied => {
                log_peer_event!(
                    debug,
                    subsystem::NEIGHBOURS,
                    "Suggested address denied by blacklist",
                    peer,
                    address = %address
                );
                self.ports.registry.block_address(address, session);
            }
            Admission::Pending(check) => {
                table.pending.insert(
                    check,
                    PendingCheck::Suggestion {
                        peer,
                        generation,
                        address: address.clone(),
                        session,
                        bandwidth_in,
                        bandwidth_out,
                    },
                );
            }
        }
    }

    fn disconnect(&self, peer: &PeerId, forced: bool) {
        let now = self.now();
        let mut table = self.table.lock();
        self.disconnect_locked(&mut table, peer, forced, now);
    }

    fn send(
        &self,
        peer: &PeerId,
        payload: Vec<u8>,
        timeout: Duration,
        receipt: u64,
    ) -> Result<(), NeighbourError> {
        if payload.len() < HEADER_SIZE {
            return Err(NeighbourError::Malformed(payload.len()));
        }
        let now = self.now();
        let mut table = self.table.lock();
        let entry = table
            .neighbours
            .get_mut(peer)
            .ok_or(NeighbourError::NotConnected)?;
        if !entry.state.is_connected() {
            return Err(NeighbourError::NotConnected);
        }
        entry.queue.push(QueuedMessage {
            payload,
            timeout_at: now.saturating_add(timeout),
            receipt,
        });
        self.try_transmission(&mut table, peer, now);
        Ok(())
    }

    fn is_connected(&self, peer: &PeerId) -> bool {
        self.table
            .lock()
            .neighbours
            .get(peer)
            .is_some_and(|e| e.state.is_connected())
    }

    fn iterate(&self) -> Vec<NeighbourInfo> {
        let table = self.table.lock();
        let mut infos: Vec<NeighbourInfo> = table.neighbours.values().map(|e| e.info()).collect();
        infos.sort_by_key(|i| i.peer);
        infos
    }

    fn info(&self, peer: &PeerId) -> Option<NeighbourInfo> {
        self.table.lock().neighbours.get(peer).map(|e| e.info())
    }
}

impl NeighbourService {
    /// Flat state of `peer`, if an entry exists.
    pub fn state_of(&self, peer: &PeerId) -> Option<ConnectionState> {
        self.table.lock().neighbours.get(peer).map(|e| e.kind())
    }
}
