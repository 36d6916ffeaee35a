use parking_lot::Mutex;
use rand::Rng;
use shared_crypto::PeerKeyPair;
use shared_types::{
    Address, Admission, AdmissionRequest, CheckId, ClientEvent, PeerId, PingMessage,
    SendRequest, Timestamp, WireMessage,
};
use std::collections::HashMap;
use std::time::Duration;
use transport_telemetry::{log_event, log_peer_event, subsystem};

use crate::domain::{OwnAddresses, PingBudget, SignatureCache, ValidationConfig, ValidationEntry};
use crate::ports::ValidationPorts;

/// Mutable state behind the service lock.
pub(crate) struct ValidationTable {
    pub(crate) entries: HashMap<Address, ValidationEntry>,
    pub(crate) own: OwnAddresses,
    pub(crate) signatures: SignatureCache,
    pub(crate) budget: PingBudget,
    /// Admission checks in flight, by the address they are for.
    pub(crate) pending: HashMap<CheckId, Address>,
}

/// Address validation service.
///
/// Holds one [`ValidationEntry`] per (peer, address). Message handlers live
/// in [`ValidationMessageHandler`](crate::ValidationMessageHandler), the
/// host-facing API in [`AddressValidationApi`](crate::AddressValidationApi)
/// and the timer work in `poll`.
///
/// # Example
///
/// ```rust,ignore
/// let validation = AddressValidationService::new(config, keypair, ports);
/// validation.add_own_address("udp", b"192.0.2.1:2086");
/// validation.handle_hello(&hello);
/// validation.poll();
/// ```
pub struct AddressValidationService {
    pub(crate) config: ValidationConfig,
    pub(crate) keypair: PeerKeyPair,
    pub(crate) local: PeerId,
    pub(crate) ports: ValidationPorts,
    pub(crate) table: Mutex<ValidationTable>,
}

impl AddressValidationService {
    /// Create the service for the peer owning `keypair`.
    pub fn new(config: ValidationConfig, keypair: PeerKeyPair, ports: ValidationPorts) -> Self {
        let local = keypair.peer_id();
        log_event!(
            debug,
            subsystem::VALIDATION,
            "Address validation created",
            local = %local,
            fast_start = config.fast_start_threshold()
        );
        Self {
            config,
            keypair,
            local,
            ports,
            table: Mutex::new(ValidationTable {
                entries: HashMap::new(),
                own: OwnAddresses::new(),
                signatures: SignatureCache::new(),
                budget: PingBudget::new(),
                pending: HashMap::new(),
            }),
        }
    }

    /// Our peer identity.
    pub fn local_peer(&self) -> PeerId {
        self.local
    }

    /// Configuration in use.
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// PINGs currently awaiting a PONG.
    pub fn pings_in_flight(&self) -> u32 {
        self.table.lock().budget.running()
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.ports.time.now()
    }

    /// Create the entry for `address` if needed and make sure a
    /// revalidation is scheduled. Returns `false` for our own peer.
    pub(crate) fn ensure_entry(
        &self,
        table: &mut ValidationTable,
        address: &Address,
        now: Timestamp,
    ) -> bool {
        if address.peer == self.local {
            return false;
        }
        let key = Address::new(address.peer, address.transport.clone(), address.raw.clone());
        let entry = table.entries.entry(key).or_insert_with_key(|key| {
            log_peer_event!(
                debug,
                subsystem::VALIDATION,
                "New validation entry",
                key.peer,
                address = %key
            );
            let entry = ValidationEntry::new(key.clone(), rand::random(), now, &self.config);
            self.ports.notifier.broadcast(ClientEvent::ValidationChanged {
                address: key.clone(),
                state: entry.state,
                last_validation: entry.send_time,
                valid_until: entry.valid_until,
                next_validation: Timestamp::ZERO,
            });
            entry
        });
        if entry.next_validation.is_none() {
            entry.next_validation = Some(now);
        }
        true
    }

    /// Run every revalidation that is due at `now`.
    pub(crate) fn revalidate_due(&self, table: &mut ValidationTable, now: Timestamp) -> usize {
        let mut due: Vec<(Timestamp, Address)> = table
            .entries
            .values()
            .filter_map(|e| match e.next_validation {
                Some(at) if at <= now => Some((at, e.address.clone())),
                _ => None,
            })
            .collect();
        due.sort_by_key(|(at, _)| *at);
        let count = due.len();
        for (_, address) in due {
            self.revalidate(table, &address, now);
        }
        count
    }

    /// One revalidation round for `address`.
    fn revalidate(&self, table: &mut ValidationTable, address: &Address, now: Timestamp) {
        let threshold = self.config.fast_start_threshold();
        let Some(entry) = table.entries.get_mut(address) else {
            return;
        };
        entry.next_validation = None;

        if entry.revalidation_block > now {
            entry.next_validation = Some(entry.revalidation_block);
            return;
        }
        if let Some(wait) = table.budget.blocked_for(now, threshold) {
            log_peer_event!(
                trace,
                subsystem::VALIDATION,
                "Revalidation paced",
                address.peer,
                wait_ms = wait.as_millis() as u64
            );
            entry.next_validation = Some(now.saturating_add(wait));
            return;
        }

        let delay = entry.tier(now).delay(&self.config);
        entry.revalidation_block = now.saturating_add(delay);
        table.budget.on_revalidate(now, self.config.validation_delay());
        let jitter = rand::thread_rng().gen_range(0..=delay.as_millis() as u64);
        entry.next_validation =
            Some(now.saturating_add(delay).saturating_add(Duration::from_millis(jitter)));

        if entry.expecting_pong {
            return;
        }
        if let Some(old) = entry.pending_check.take() {
            table.pending.remove(&old);
            self.ports.admission.cancel(old);
        }

        match self
            .ports
            .admission
            .test_allowed(AdmissionRequest::address(address, None))
        {
            Admission::Allowed => self.transmit_ping(table, address, now),
            Admission::Denied => {
                log_peer_event!(
                    debug,
                    subsystem::VALIDATION,
                    "PING not allowed by blacklist",
                    address.peer,
                    address = %address
                );
            }
            Admission::Pending(check) => {
                if let Some(entry) = table.entries.get_mut(address) {
                    entry.pending_check = Some(check);
                }
                table.pending.insert(check, address.clone());
            }
        }
    }

    /// Send HELLO followed by a fresh PING to `address`.
    pub(crate) fn transmit_ping(
        &self,
        table: &mut ValidationTable,
        address: &Address,
        now: Timestamp,
    ) {
        let Some(session) = self.ports.transport.get_session(address) else {
            log_peer_event!(
                debug,
                subsystem::VALIDATION,
                "No session for PING",
                address.peer,
                address = %address
            );
            return;
        };
        let hello = table.own.hello(
            self.local,
            now.saturating_add(self.config.hello_address_expiration),
        );
        let Some(entry) = table.entries.get_mut(address) else {
            return;
        };
        entry.challenge = rand::random();
        let ping = PingMessage {
            challenge: entry.challenge,
            target: address.peer,
            address: Some((address.transport.clone(), address.raw.clone())),
        };

        let payload = match (
            WireMessage::Hello(hello).encode(),
            WireMessage::Ping(ping).encode(),
        ) {
            (Ok(mut hello), Ok(ping)) => {
                hello.extend_from_slice(&ping);
                hello
            }
            (Err(e), _) | (_, Err(e)) => {
                log_peer_event!(warn, subsystem::VALIDATION, "Cannot encode PING", address.peer, error = %e);
                return;
            }
        };

        let request = SendRequest {
            address: address.clone(),
            session,
            payload,
            priority: self.config.priority,
            timeout: self.config.send_timeout,
            token: None,
        };
        if let Err(e) = self.ports.transport.send(request) {
            log_peer_event!(
                debug,
                subsystem::VALIDATION,
                "PING send failed",
                address.peer,
                address = %address,
                error = %e
            );
            return;
        }

        entry.network = self.ports.transport.network_type(address, session);
        entry.send_time = now;
        entry.expecting_pong = true;
        table
            .budget
            .on_ping_sent(now, self.config.validation_delay());
        log_peer_event!(
            debug,
            subsystem::VALIDATION,
            "PING sent",
            address.peer,
            address = %address,
            challenge = entry.challenge,
            in_flight = table.budget.running()
        );
        self.notify_changed(entry);
    }

    pub(crate) fn notify_changed(&self, entry: &ValidationEntry) {
        self.ports.notifier.broadcast(ClientEvent::ValidationChanged {
            address: entry.address.clone(),
            state: entry.state,
            last_validation: entry.send_time,
            valid_until: entry.valid_until,
            next_validation: entry.next_validation.unwrap_or(Timestamp::ZERO),
        });
    }

    /// Remove an entry and unregister it everywhere.
    pub(crate) fn remove_entry(&self, table: &mut ValidationTable, address: &Address) {
        let Some(entry) = table.entries.remove(address) else {
            return;
        };
        if let Some(check) = entry.pending_check {
            table.pending.remove(&check);
            self.ports.admission.cancel(check);
        }
        if entry.expecting_pong {
            table.budget.on_ping_done();
        }
        if entry.known_to_ats {
            self.ports.registry.expire_address(&entry.address);
        }
        log_peer_event!(
            debug,
            subsystem::VALIDATION,
            "Validation entry removed",
            address.peer,
            address = %address
        );
        self.ports.notifier.broadcast(ClientEvent::ValidationRemoved {
            address: entry.address,
        });
    }
}
