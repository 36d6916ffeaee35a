use shared_crypto::{PeerPublicKey, PeerSignature, SignaturePurpose};
use shared_types::{
    Address, AddressProperties, HelloMessage, PeerId, PingMessage, PongMessage, SendRequest,
    SessionId, TransportError, ValidationState, WireMessage,
};
use transport_telemetry::{log_peer_event, subsystem};

use crate::domain::{PongRejectReason, ValidationError};
use crate::ports::ValidationMessageHandler;
use crate::service::AddressValidationService;

impl AddressValidationService {
    /// Send an encoded PONG on `session`.
    fn send_pong(
        &self,
        address: &Address,
        session: SessionId,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.ports.transport.send(SendRequest {
            address: address.clone(),
            session,
            payload: payload.to_vec(),
            priority: self.config.priority,
            timeout: self.config.send_timeout,
            token: None,
        })
    }
}

impl ValidationMessageHandler for AddressValidationService {
    fn handle_hello(&self, hello: &HelloMessage) -> usize {
        if hello.peer == self.local {
            return 0;
        }
        let now = self.now();
        let mut table = self.table.lock();
        let mut count = 0;
        for advertised in &hello.entries {
            if advertised.expiration <= now {
                continue;
            }
            let address = Address::new(hello.peer, advertised.transport.clone(), advertised.raw.clone());
            if self.ensure_entry(&mut table, &address, now) {
                count += 1;
            }
        }
        log_peer_event!(
            debug,
            subsystem::VALIDATION,
            "HELLO processed",
            hello.peer,
            advertised = hello.entries.len(),
            accepted = count
        );
        self.revalidate_due(&mut table, now);
        count
    }

    fn handle_ping(
        &self,
        sender: &PeerId,
        ping: &PingMessage,
        sender_address: &Address,
        session: Option<SessionId>,
    ) -> Result<(), ValidationError> {
        if ping.target != self.local {
            return Err(ValidationError::NotForUs);
        }
        let now = self.now();
        let mut table = self.table.lock();

        let (purpose, transport, raw) = match &ping.address {
            Some((transport, raw)) => {
                if !table.own.contains(transport, raw)
                    || !self.ports.transport.check_address(transport, raw)
                {
                    log_peer_event!(
                        debug,
                        subsystem::VALIDATION,
                        "PING for an address that is not ours",
                        sender,
                        transport = %transport
                    );
                    return Err(ValidationError::AddressNotOwned(transport.clone()));
                }
                (SignaturePurpose::PongOwn, transport.clone(), raw.clone())
            }
            None => {
                if session.is_none() {
                    return Err(ValidationError::NoSession);
                }
                (
                    SignaturePurpose::PongUsing,
                    sender_address.transport.clone(),
                    sender_address.raw.clone(),
                )
            }
        };

        let signed = table.signatures.get_or_sign(
            &self.keypair,
            purpose,
            &transport,
            &raw,
            now,
            self.config.pong_signature_lifetime,
        );
        let pong = PongMessage {
            challenge: ping.challenge,
            signature: *signed.signature.as_bytes(),
            purpose_size: signed.size,
            purpose: purpose.code(),
            expiration: signed.expiration,
            transport,
            raw,
        };
        let payload = WireMessage::Pong(pong).encode().map_err(|e| {
            ValidationError::Undeliverable(TransportError::SendFailed(e.to_string()))
        })?;

        // A PING learned over an outbound-style address is worth validating
        // in the other direction too.
        if !sender_address.inbound {
            self.ensure_entry(&mut table, sender_address, now);
        }

        let mut last_error = TransportError::NoSession;
        if let Some(session) = session {
            match self.send_pong(sender_address, session, &payload) {
                Ok(()) => {
                    log_peer_event!(debug, subsystem::VALIDATION, "PONG sent", sender, session = %session);
                    return Ok(());
                }
                Err(e) => last_error = e,
            }
        }

        // Arrival session gone: try every address we know for the sender.
        let fallbacks: Vec<Address> = table
            .entries
            .keys()
            .filter(|a| a.peer == *sender)
            .cloned()
            .collect();
        for address in fallbacks {
            let Some(session) = self.ports.transport.get_session(&address) else {
                continue;
            };
            match self.send_pong(&address, session, &payload) {
                Ok(()) => {
                    log_peer_event!(
                        debug,
                        subsystem::VALIDATION,
                        "PONG sent over fallback address",
                        sender,
                        address = %address
                    );
                    return Ok(());
                }
                Err(e) => last_error = e,
            }
        }
        log_peer_event!(
            debug,
            subsystem::VALIDATION,
            "PONG could not be delivered",
            sender,
            error = %last_error
        );
        Err(ValidationError::Undeliverable(last_error))
    }

    fn handle_pong(&self, sender: &PeerId, pong: &PongMessage) -> Result<(), ValidationError> {
        let reject = |reason: PongRejectReason| -> Result<(), ValidationError> {
            log_peer_event!(debug, subsystem::VALIDATION, "PONG rejected", sender, reason = ?reason);
            Err(ValidationError::PongRejected(reason))
        };

        let now = self.now();
        let address = Address::new(*sender, pong.transport.clone(), pong.raw.clone());
        let mut table = self.table.lock();
        let table = &mut *table;
        let Some(entry) = table.entries.get_mut(&address) else {
            return reject(PongRejectReason::UnknownAddress);
        };
        if !entry.expecting_pong {
            return reject(PongRejectReason::NotExpected);
        }
        if pong.challenge != entry.challenge {
            return reject(PongRejectReason::ChallengeMismatch);
        }
        // Checked before the cache so a replayed signature cannot outlive
        // the expiration it was made for.
        if pong.expiration <= now {
            return reject(PongRejectReason::Expired);
        }
        let cached = entry.cached_signature_matches(&pong.signature, pong.expiration, now);
        if !cached {
            let verified = PeerPublicKey::from_peer(sender).and_then(|key| {
                key.verify_purpose(
                    SignaturePurpose::PongOwn,
                    pong.purpose_size,
                    pong.purpose,
                    &pong.signed_body(),
                    &PeerSignature::from_bytes(pong.signature),
                )
            });
            if verified.is_err() {
                return reject(PongRejectReason::BadSignature);
            }
        }

        entry.expecting_pong = false;
        table.budget.on_ping_done();
        entry.extend_validity(now.saturating_add(self.config.hello_address_expiration));
        if !cached {
            entry.pong_signature = Some(pong.signature);
            entry.pong_signature_valid_until = pong.expiration;
        }

        let latency = now.saturating_duration_since(entry.send_time);
        let quality_changed = entry.latency != Some(latency);
        let cost_changed = entry.network != entry.reported_network;
        entry.latency = Some(latency);
        entry.reported_network = entry.network;
        entry.state = match (quality_changed, cost_changed) {
            (true, true) => ValidationState::QualityCostUpdated,
            (true, false) => ValidationState::QualityUpdated,
            (false, true) => ValidationState::CostUpdated,
            (false, false) => ValidationState::Unmodified,
        };

        if entry.known_to_ats {
            self.ports.registry.update_delay(&address, latency / 2);
            if cost_changed {
                self.ports.registry.update_network(&address, entry.network);
            }
        } else {
            self.ports.registry.add_address(
                &address,
                AddressProperties {
                    delay: latency / 2,
                    network: entry.network,
                    ..AddressProperties::default()
                },
            );
            entry.known_to_ats = true;
        }
        self.ports.peerinfo.add_address(&address, entry.valid_until);

        log_peer_event!(
            debug,
            subsystem::VALIDATION,
            "Address validated",
            sender,
            address = %address,
            latency_ms = latency.as_millis() as u64,
            valid_until = %entry.valid_until,
            state = ?entry.state
        );
        self.notify_changed(entry);
        Ok(())
    }
}
