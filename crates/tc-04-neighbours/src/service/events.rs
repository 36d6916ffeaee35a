use shared_crypto::{PeerPublicKey, PeerSignature, SignaturePurpose};
use shared_types::{
    Address, Bandwidth, ClientEvent, ConnectionState, DisconnectMessage, PeerId, SendToken,
    SessionId, SynMessage, WireMessage,
};
use std::time::Duration;
use transport_telemetry::{log_peer_event, subsystem};

use crate::domain::{
    AckState, AddressSlot, DisconnectRejectReason, InboundVerdict, NeighbourError,
    NeighbourState,
};
use crate::ports::NeighbourMessageHandler;
use crate::service::NeighbourService;

/// Does `slot` carry the SYN a SYN_ACK over `address` answers?
fn answers_syn(slot: &AddressSlot, syn: &SynMessage, address: &Address) -> bool {
    slot.address.same_endpoint(address) && slot.connect_timestamp == syn.timestamp
}

impl NeighbourMessageHandler for NeighbourService {
    fn handle_syn(&self, peer: &PeerId, syn: &SynMessage) -> Result<(), NeighbourError> {
        if *peer == self.local {
            return Err(NeighbourError::SelfConnect);
        }
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;

        // A SYN during teardown starts over, on the sessions we still have.
        if table
            .neighbours
            .get(peer)
            .is_some_and(|e| e.kind().is_disconnecting())
        {
            self.free_neighbour(table, peer, true);
        }
        if !table.neighbours.contains_key(peer) {
            self.create_entry(table, *peer, now);
        }
        let Some(entry) = table.neighbours.get_mut(peer) else {
            return Err(NeighbourError::UnknownPeer);
        };
        entry.ack_state = AckState::MustSendSynAck;
        entry.connect_ack_timestamp = syn.timestamp;
        log_peer_event!(
            debug,
            subsystem::NEIGHBOURS,
            "SYN received",
            peer,
            state = ?entry.kind(),
            timestamp = %syn.timestamp
        );

        match entry.kind() {
            ConnectionState::NotConnected | ConnectionState::InitAts => {
                self.set_state(
                    entry,
                    NeighbourState::SynRecvAts,
                    now.saturating_add(self.config.ats_response_timeout),
                );
                if !entry.suggestions_active {
                    entry.suggestions_active = true;
                    self.ports.registry.request_suggestions(peer);
                }
            }
            // Answered once an address arrives.
            ConnectionState::SynRecvAts | ConnectionState::ReconnectAts => {}
            _ => {
                if let Some(primary) = entry.state.primary() {
                    if self.send_syn_ack(peer, primary, syn.timestamp) {
                        entry.ack_state = AckState::Undefined;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_syn_ack(
        &self,
        peer: &PeerId,
        syn: &SynMessage,
        address: &Address,
        session: SessionId,
    ) -> Result<(), NeighbourError> {
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;
        let entry = table
            .neighbours
            .get_mut(peer)
            .ok_or(NeighbourError::UnknownPeer)?;
        let idle = now.saturating_add(self.config.idle_connection_timeout);

        let state = std::mem::replace(&mut entry.state, NeighbourState::NotConnected);
        let promoted = match state {
            NeighbourState::SynSent { primary } | NeighbourState::ReconnectSent { primary }
                if answers_syn(&primary, syn, address) =>
            {
                primary
            }
            NeighbourState::SwitchSynSent {
                primary,
                alternative,
            } if answers_syn(&alternative, syn, address) => {
                self.release_replaced(primary, &alternative);
                alternative
            }
            NeighbourState::Connected { primary } if answers_syn(&primary, syn, address) => {
                entry.state = NeighbourState::Connected { primary };
                if let Some(primary) = entry.state.primary() {
                    self.send_ack(peer, primary);
                }
                log_peer_event!(trace, subsystem::NEIGHBOURS, "Duplicate SYN_ACK", peer);
                return Ok(());
            }
            other => {
                let kind = other.kind();
                entry.state = other;
                log_peer_event!(
                    debug,
                    subsystem::NEIGHBOURS,
                    "Ignoring SYN_ACK",
                    peer,
                    state = ?kind,
                    address = %address,
                    timestamp = %syn.timestamp
                );
                return Err(NeighbourError::StaleSynAck);
            }
        };

        let mut primary = promoted;
        self.mark_in_use(&mut primary);
        entry.ack_state = AckState::MustSendAck;
        if self.send_ack(peer, &primary) {
            entry.ack_state = AckState::Undefined;
        }
        self.ports
            .registry
            .reset_block(&primary.address, Some(session));
        entry.keep_alive_time = now.saturating_add(self.config.keepalive_frequency);
        self.set_state(entry, NeighbourState::Connected { primary }, idle);
        self.try_transmission(table, peer, now);
        Ok(())
    }

    fn handle_ack(
        &self,
        peer: &PeerId,
        address: &Address,
        session: SessionId,
    ) -> Result<(), NeighbourError> {
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;
        let entry = table
            .neighbours
            .get_mut(peer)
            .ok_or(NeighbourError::UnknownPeer)?;
        match &entry.state {
            NeighbourState::SynRecvAck { primary } if primary.address.same_endpoint(address) => {}
            state if state.is_connected() => {
                log_peer_event!(trace, subsystem::NEIGHBOURS, "Duplicate ACK", peer);
                return Ok(());
            }
            state => {
                return Err(NeighbourError::UnexpectedMessage {
                    message: "ACK",
                    state: state.kind(),
                })
            }
        }
        let (Some(primary), _) = entry.state.take_slots() else {
            return Err(NeighbourError::NotConnected);
        };
        entry.ack_state = AckState::Undefined;
        self.ports
            .registry
            .reset_block(&primary.address, Some(session));
        entry.keep_alive_time = now.saturating_add(self.config.keepalive_frequency);
        self.set_state(
            entry,
            NeighbourState::Connected { primary },
            now.saturating_add(self.config.idle_connection_timeout),
        );
        self.try_transmission(table, peer, now);
        Ok(())
    }

    fn handle_disconnect_message(
        &self,
        peer: &PeerId,
        message: &DisconnectMessage,
    ) -> Result<(), NeighbourError> {
        let reject = |reason: DisconnectRejectReason| -> Result<(), NeighbourError> {
            log_peer_event!(debug, subsystem::NEIGHBOURS, "DISCONNECT rejected", peer, reason = ?reason);
            Err(NeighbourError::BadDisconnect(reason))
        };
        if message.public_key != *peer.as_bytes() {
            return reject(DisconnectRejectReason::KeyMismatch);
        }
        let verified = PeerPublicKey::from_peer(peer).and_then(|key| {
            key.verify_purpose(
                SignaturePurpose::Disconnect,
                message.purpose_size,
                message.purpose,
                &message.signed_body(),
                &PeerSignature::from_bytes(message.signature),
            )
        });
        if verified.is_err() {
            return reject(DisconnectRejectReason::BadSignature);
        }

        let mut table = self.table.lock();
        let entry = table
            .neighbours
            .get(peer)
            .ok_or(NeighbourError::UnknownPeer)?;
        if message.timestamp <= entry.connect_ack_timestamp {
            return reject(DisconnectRejectReason::Stale);
        }
        log_peer_event!(debug, subsystem::NEIGHBOURS, "DISCONNECT received", peer);
        self.free_neighbour(&mut table, peer, false);
        Ok(())
    }

    fn handle_keepalive(&self, peer: &PeerId, nonce: u32) -> Result<(), NeighbourError> {
        let now = self.now();
        let mut table = self.table.lock();
        let entry = table
            .neighbours
            .get_mut(peer)
            .ok_or(NeighbourError::UnknownPeer)?;
        if !entry.state.is_connected() {
            return Err(NeighbourError::NotConnected);
        }
        let Some(primary) = entry.state.primary() else {
            return Err(NeighbourError::NotConnected);
        };
        self.send_control(primary, WireMessage::KeepaliveResponse { nonce })?;
        if matches!(entry.state, NeighbourState::Connected { .. }) {
            entry.timeout = now.saturating_add(self.config.idle_connection_timeout);
        }
        Ok(())
    }

    fn handle_keepalive_response(
        &self,
        peer: &PeerId,
        nonce: u32,
    ) -> Result<(), NeighbourError> {
        let now = self.now();
        let mut table = self.table.lock();
        let entry = table
            .neighbours
            .get_mut(peer)
            .ok_or(NeighbourError::UnknownPeer)?;
        let kind = entry.kind();
        let expected = entry.expect_latency_response;
        let Some(primary) = entry.state.primary_mut() else {
            return Err(NeighbourError::NotConnected);
        };
        if !kind.is_connected() || !expected || nonce == 0 || primary.keep_alive_nonce != nonce {
            return Err(NeighbourError::UnexpectedMessage {
                message: "KEEPALIVE_RESPONSE",
                state: kind,
            });
        }
        primary.keep_alive_nonce = 0;
        let latency = now.saturating_duration_since(entry.last_keep_alive_time);
        self.ports.registry.update_delay(&primary.address, latency / 2);
        entry.expect_latency_response = false;
        entry.latency = Some(latency);
        if kind == ConnectionState::Connected {
            entry.timeout = now.saturating_add(self.config.idle_connection_timeout);
        }
        log_peer_event!(
            trace,
            subsystem::NEIGHBOURS,
            "Keepalive answered",
            peer,
            latency_ms = latency.as_millis() as u64
        );
        Ok(())
    }

    fn handle_quota(&self, peer: &PeerId, bytes_per_sec: u32) -> Result<(), NeighbourError> {
        let mut table = self.table.lock();
        let entry = table
            .neighbours
            .get_mut(peer)
            .ok_or(NeighbourError::UnknownPeer)?;
        let quota = Bandwidth::new(bytes_per_sec).max(Bandwidth::MIN);
        if entry.neighbour_receive_quota == quota {
            return Ok(());
        }
        entry.neighbour_receive_quota = quota;
        log_peer_event!(
            debug,
            subsystem::NEIGHBOURS,
            "Neighbour changed our quota",
            peer,
            quota = %quota
        );
        if let Some(primary) = entry.state.primary() {
            self.ports.notifier.broadcast(ClientEvent::QuotaAdvisory {
                peer: *peer,
                bandwidth_out: quota.min(primary.bandwidth_out),
            });
        }
        Ok(())
    }

    fn on_inbound_data(&self, peer: &PeerId, size: usize) -> InboundVerdict {
        let now = self.now();
        let mut table = self.table.lock();
        let Some(entry) = table.neighbours.get_mut(peer) else {
            return InboundVerdict {
                delay: Duration::ZERO,
                forward: false,
            };
        };
        entry.util_bytes_in = entry.util_bytes_in.saturating_add(size as u64);
        let unit = i64::from(self.config.max_fragmentation_unit);
        if entry.in_tracker.consume(now, size as i64) {
            entry.quota_violation_count += 1;
            entry.in_tracker.consume(now, -unit);
        } else if entry.quota_violation_count > 0 {
            // Penalty decays by one per message within quota
            entry.in_tracker.consume(now, unit);
            entry.quota_violation_count -= 1;
        }
        if entry.quota_violation_count > self.config.quota_violation_throttle_threshold {
            log_peer_event!(
                debug,
                subsystem::NEIGHBOURS,
                "Throttling peer exceeding its quota",
                peer,
                violations = entry.quota_violation_count
            );
            return InboundVerdict {
                delay: self.config.quota_violation_timeout,
                forward: true,
            };
        }
        InboundVerdict {
            delay: entry.in_tracker.get_delay(now, 0),
            forward: true,
        }
    }

    fn on_session_terminated(&self, peer: &PeerId, session: SessionId) -> bool {
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;
        let Some(entry) = table.neighbours.get_mut(peer) else {
            return false;
        };

        if entry.state.alternative().is_some_and(|a| a.session == session) {
            let timeout = entry.timeout;
            if let (Some(primary), Some(alternative)) = entry.state.take_slots() {
                self.release_slot(alternative, false);
                self.set_state(entry, NeighbourState::Connected { primary }, timeout);
            }
            return true;
        }
        if entry.state.primary().map(|p| p.session) != Some(session) {
            return false;
        }
        log_peer_event!(
            debug,
            subsystem::NEIGHBOURS,
            "Primary session ended",
            peer,
            session = %session,
            state = ?entry.kind()
        );

        let ats = now.saturating_add(self.config.ats_response_timeout);
        match std::mem::replace(&mut entry.state, NeighbourState::NotConnected) {
            NeighbourState::SynSent { primary } => {
                self.ports
                    .registry
                    .block_address(&primary.address, Some(session));
                self.release_slot(primary, false);
                self.set_state(entry, NeighbourState::InitAts, ats);
            }
            NeighbourState::Connected { primary } | NeighbourState::ReconnectSent { primary } => {
                self.release_slot(primary, false);
                self.set_state(entry, NeighbourState::ReconnectAts, ats);
            }
            NeighbourState::SwitchSynSent {
                primary,
                mut alternative,
            } => {
                self.release_slot(primary, false);
                self.mark_in_use(&mut alternative);
                self.set_state(
                    entry,
                    NeighbourState::ReconnectSent {
                        primary: alternative,
                    },
                    now.saturating_add(self.config.fast_reconnect_timeout),
                );
            }
            NeighbourState::SynRecvAck { primary }
            | NeighbourState::Disconnect {
                primary: Some(primary),
            } => {
                entry.state = NeighbourState::Disconnect {
                    primary: Some(primary),
                };
                self.free_neighbour(table, peer, true);
            }
            other => entry.state = other,
        }
        true
    }

    fn on_send_complete(&self, token: SendToken, success: bool, bytes: usize) {
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;
        let Some((peer, generation)) = table.in_flight.remove(&token) else {
            return;
        };
        let Some(entry) = table.neighbours.get_mut(&peer) else {
            return;
        };
        if entry.generation != generation {
            return;
        }
        let Some(done) = entry.queue.complete(token) else {
            return;
        };
        if success {
            entry.util_bytes_out = entry.util_bytes_out.saturating_add(bytes as u64);
        }
        self.send_complete(peer, done.receipt, success, done.bytes);
        self.try_transmission(table, &peer, now);
    }
}
