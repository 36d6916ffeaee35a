use shared_types::{
    Admission, AdmissionRequest, CheckId, ConnectionState, PeerId, Timestamp, Verdict,
    WireMessage,
};
use transport_telemetry::{log_event, log_peer_event, subsystem};

use super::core::{NeighbourTable, PendingCheck};
use crate::domain::{AckState, NeighbourState};
use crate::service::NeighbourService;

impl NeighbourService {
    /// Timer work: expired state deadlines first, then per-neighbour
    /// housekeeping (queue, keepalives, owed handshake messages) and the
    /// periodic utilization report.
    ///
    /// Call from the host tick. Returns how many deadlines fired.
    pub fn poll(&self) -> usize {
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;

        let mut expired: Vec<PeerId> = table
            .neighbours
            .values()
            .filter(|e| e.timeout <= now)
            .map(|e| e.peer)
            .collect();
        expired.sort();
        for peer in &expired {
            self.handle_deadline(table, peer, now);
        }

        let mut peers: Vec<PeerId> = table.neighbours.keys().copied().collect();
        peers.sort();
        for peer in &peers {
            self.try_transmission(table, peer, now);
            self.send_keepalive(table, peer, now);
            self.retry_handshake(table, peer);
        }

        if table.last_util_report.saturating_add(self.config.util_transmission_interval) <= now {
            self.report_utilization(table, now);
        }
        if !expired.is_empty() {
            log_event!(
                trace,
                subsystem::NEIGHBOURS,
                "Neighbour poll",
                deadlines = expired.len(),
                neighbours = table.neighbours.len()
            );
        }
        expired.len()
    }

    /// Fallback for a state whose deadline passed.
    fn handle_deadline(&self, table: &mut NeighbourTable, peer: &PeerId, now: Timestamp) {
        let Some(entry) = table.neighbours.get_mut(peer) else {
            return;
        };
        let kind = entry.kind();
        log_peer_event!(
            debug,
            subsystem::NEIGHBOURS,
            "Neighbour state timed out",
            peer,
            state = ?kind
        );
        match kind {
            ConnectionState::NotConnected
            | ConnectionState::InitAts
            | ConnectionState::SynRecvAts
            | ConnectionState::Disconnect
            | ConnectionState::DisconnectFinished => self.free_neighbour(table, peer, false),
            ConnectionState::SynSent | ConnectionState::ReconnectSent => {
                if let Some(primary) = entry.state.primary() {
                    self.ports
                        .registry
                        .block_address(&primary.address, Some(primary.session));
                }
                self.disconnect_locked(table, peer, false, now);
            }
            ConnectionState::SynRecvAck
            | ConnectionState::Connected
            | ConnectionState::ReconnectAts => self.disconnect_locked(table, peer, false, now),
            ConnectionState::SwitchSynSent => {
                if let (Some(primary), Some(alternative)) = entry.state.take_slots() {
                    self.ports
                        .registry
                        .block_address(&alternative.address, Some(alternative.session));
                    self.release_replaced(alternative, &primary);
                    self.set_state(
                        entry,
                        NeighbourState::Connected { primary },
                        now.saturating_add(self.config.idle_connection_timeout),
                    );
                }
            }
        }
    }

    /// Probe the primary of a connected neighbour when its keepalive is due.
    fn send_keepalive(&self, table: &mut NeighbourTable, peer: &PeerId, now: Timestamp) {
        let Some(entry) = table.neighbours.get_mut(peer) else {
            return;
        };
        if !matches!(
            entry.state,
            NeighbourState::Connected { .. } | NeighbourState::SwitchSynSent { .. }
        ) || entry.keep_alive_time > now
        {
            return;
        }
        let mut nonce = 0;
        while nonce == 0 {
            nonce = rand::random::<u32>();
        }
        let Some(primary) = entry.state.primary_mut() else {
            return;
        };
        if let Err(e) = self.send_control(primary, WireMessage::Keepalive { nonce }) {
            log_peer_event!(debug, subsystem::NEIGHBOURS, "Keepalive send failed", peer, error = %e);
            return;
        }
        primary.keep_alive_nonce = nonce;
        entry.expect_latency_response = true;
        entry.last_keep_alive_time = now;
        entry.keep_alive_time = now.saturating_add(self.config.keepalive_frequency);
    }

    /// Resend a SYN_ACK or ACK whose earlier send failed.
    fn retry_handshake(&self, table: &mut NeighbourTable, peer: &PeerId) {
        let Some(entry) = table.neighbours.get_mut(peer) else {
            return;
        };
        if entry.kind().is_disconnecting() {
            return;
        }
        let Some(primary) = entry.state.primary() else {
            return;
        };
        let sent = match entry.ack_state {
            AckState::Undefined => return,
            AckState::MustSendSynAck => {
                self.send_syn_ack(peer, primary, entry.connect_ack_timestamp)
            }
            AckState::MustSendAck => self.send_ack(peer, primary),
        };
        if sent {
            entry.ack_state = AckState::Undefined;
        }
    }

    /// Push bytes/s since the last report to the route-selection bridge.
    fn report_utilization(&self, table: &mut NeighbourTable, now: Timestamp) {
        let elapsed = now.saturating_duration_since(table.last_util_report);
        table.last_util_report = now;
        let millis = elapsed.as_millis().max(1) as u64;
        for entry in table.neighbours.values_mut() {
            let bytes_in = std::mem::take(&mut entry.util_bytes_in);
            let bytes_out = std::mem::take(&mut entry.util_bytes_out);
            let Some(primary) = entry.state.primary() else {
                continue;
            };
            if !entry.state.is_connected() {
                continue;
            }
            let bps_in = u32::try_from(bytes_in.saturating_mul(1_000) / millis).unwrap_or(u32::MAX);
            let bps_out =
                u32::try_from(bytes_out.saturating_mul(1_000) / millis).unwrap_or(u32::MAX);
            self.ports
                .registry
                .update_utilization(&primary.address, bps_in, bps_out);
        }
    }

    /// Route a blacklist verdict. Returns `false` if the check was not
    /// started by the neighbour service.
    pub fn on_blacklist_verdict(&self, check: CheckId, verdict: Verdict) -> bool {
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;
        let Some(pending) = table.pending.remove(&check) else {
            return false;
        };
        let current = |table: &NeighbourTable, peer: &PeerId, generation: u64| {
            table
                .neighbours
                .get(peer)
                .is_some_and(|e| e.generation == generation)
        };
        match pending {
            PendingCheck::TryConnect { peer } => {
                if verdict == Verdict::Allowed {
                    self.start_connect(table, peer, now);
                } else {
                    log_peer_event!(
                        debug,
                        subsystem::NEIGHBOURS,
                        "Connect request not allowed",
                        peer,
                        verdict = ?verdict
                    );
                }
            }
            PendingCheck::Suggestion {
                peer,
                generation,
                address,
                session,
                bandwidth_in,
                bandwidth_out,
            } => {
                if !current(table, &peer, generation) {
                    log_peer_event!(
                        debug,
                        subsystem::NEIGHBOURS,
                        "Verdict for a previous neighbour entry",
                        peer,
                        generation = generation
                    );
                    return true;
                }
                match verdict {
                    Verdict::Allowed => self.apply_suggestion(
                        table,
                        &address,
                        session,
                        bandwidth_in,
                        bandwidth_out,
                        now,
                    ),
                    Verdict::Denied => self.ports.registry.block_address(&address, session),
                    Verdict::Aborted => {}
                }
            }
            PendingCheck::Recheck { peer, generation } => {
                if verdict == Verdict::Denied && current(table, &peer, generation) {
                    log_peer_event!(
                        info,
                        subsystem::NEIGHBOURS,
                        "Connected peer now blacklisted",
                        peer
                    );
                    self.disconnect_locked(table, &peer, false, now);
                }
            }
        }
        true
    }

    /// Ask the gate about every connected neighbour again, after a policy
    /// client joined. Denied peers are disconnected. Returns how many were
    /// disconnected right away.
    pub fn recheck_blacklist(&self) -> usize {
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;
        let mut connected: Vec<(PeerId, u64)> = table
            .neighbours
            .values()
            .filter(|e| e.state.is_connected())
            .map(|e| (e.peer, e.generation))
            .collect();
        connected.sort();
        let mut denied = 0;
        for (peer, generation) in connected {
            match self.ports.admission.test_allowed(AdmissionRequest::peer(peer)) {
                Admission::Allowed => {}
                Admission::Denied => {
                    denied += 1;
                    self.disconnect_locked(table, &peer, false, now);
                }
                Admission::Pending(check) => {
                    table
                        .pending
                        .insert(check, PendingCheck::Recheck { peer, generation });
                }
            }
        }
        denied
    }

    /// Disconnect everyone, best-effort DISCONNECT first, and free every
    /// entry. Returns how many neighbours there were.
    pub fn stop(&self) -> usize {
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;
        let peers: Vec<PeerId> = table.neighbours.keys().copied().collect();
        for peer in &peers {
            self.disconnect_locked(table, peer, false, now);
            self.free_neighbour(table, peer, false);
        }
        for (check, _) in table.pending.drain() {
            self.ports.admission.cancel(check);
        }
        log_event!(
            info,
            subsystem::NEIGHBOURS,
            "Neighbour service stopped",
            neighbours = peers.len()
        );
        peers.len()
    }
}
