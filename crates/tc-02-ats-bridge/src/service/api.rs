use shared_types::{Address, AddressProperties, AddressRegistry, NetworkType, PeerId, SessionId};
use std::time::Duration;
use transport_telemetry::{log_peer_event, subsystem};

use super::core::{find, prune, AtsBridge};
use crate::domain::AddressRecord;

impl AtsBridge {
    /// Apply `update` to every record of `address` and push the new metrics
    /// for those still registered.
    fn update_properties(&self, address: &Address, update: impl Fn(&mut AddressProperties)) {
        let mut records = self.records.lock();
        let Some(list) = records.get_mut(&address.peer) else {
            return;
        };
        for record in list.iter_mut().filter(|r| r.address == *address) {
            update(&mut record.properties);
            if record.active {
                self.route
                    .address_update(&record.address, record.session, &record.properties);
            }
        }
    }
}

impl AddressRegistry for AtsBridge {
    fn is_known(&self, address: &Address, session: Option<SessionId>) -> bool {
        find(&mut self.records.lock(), address, session).is_some()
    }

    fn is_known_no_session(&self, address: &Address) -> bool {
        self.records
            .lock()
            .get(&address.peer)
            .is_some_and(|list| list.iter().any(|r| r.address == *address))
    }

    fn add_inbound(&self, address: &Address, session: SessionId, props: AddressProperties) {
        let mut records = self.records.lock();
        if find(&mut records, address, Some(session)).is_some() {
            log_peer_event!(
                debug,
                subsystem::ATS,
                "Inbound address already known",
                address.peer,
                address = %address,
                session = %session
            );
            return;
        }
        log_peer_event!(
            debug,
            subsystem::ATS,
            "Registering inbound address",
            address.peer,
            address = %address,
            session = %session
        );
        self.route.address_add(address, Some(session), &props);
        records
            .entry(address.peer)
            .or_default()
            .push(AddressRecord::new(address.clone(), Some(session), props));
    }

    fn add_address(&self, address: &Address, props: AddressProperties) {
        let mut records = self.records.lock();
        let list = records.entry(address.peer).or_default();
        if list.iter().any(|r| r.address == *address) {
            return;
        }
        log_peer_event!(
            debug,
            subsystem::ATS,
            "Registering validated address",
            address.peer,
            address = %address
        );
        self.route.address_add(address, None, &props);
        list.push(AddressRecord::new(address.clone(), None, props));
    }

    fn new_session(&self, address: &Address, session: SessionId) {
        let mut records = self.records.lock();
        // Inbound sessions are registered through `add_inbound`
        let Some(record) = find(&mut records, address, None) else {
            return;
        };
        record.session = Some(session);
        if record.active {
            self.route.address_add_session(address, session);
        }
    }

    fn del_session(&self, address: &Address, session: SessionId) -> bool {
        let mut records = self.records.lock();
        let Some(record) = find(&mut records, address, Some(session)) else {
            return false;
        };
        if address.inbound {
            let was_active = record.active;
            if let Some(list) = records.get_mut(&address.peer) {
                list.retain(|r| !(r.address == *address && r.session == Some(session)));
            }
            prune(&mut records, &address.peer);
            if was_active {
                self.route.address_destroy(address);
            }
            log_peer_event!(
                debug,
                subsystem::ATS,
                "Inbound address gone with its session",
                address.peer,
                address = %address
            );
            return true;
        }
        record.session = None;
        if record.active {
            self.route.address_del_session(address, session);
        }
        false
    }

    fn update_delay(&self, address: &Address, delay: Duration) {
        self.update_properties(address, |p| p.delay = delay);
    }

    fn update_distance(&self, address: &Address, distance: u32) {
        self.update_properties(address, |p| p.distance = distance);
    }

    fn update_network(&self, address: &Address, network: NetworkType) {
        self.update_properties(address, |p| p.network = network);
    }

    fn update_utilization(&self, address: &Address, bps_in: u32, bps_out: u32) {
        self.update_properties(address, |p| {
            p.utilization_in = bps_in;
            p.utilization_out = bps_out;
        });
    }

    fn expire_address(&self, address: &Address) {
        let mut records = self.records.lock();
        let Some(list) = records.get_mut(&address.peer) else {
            return;
        };
        let before = list.len();
        let mut any_active = false;
        list.retain(|r| {
            let hit = r.address == *address;
            any_active |= hit && r.active;
            !hit
        });
        let removed = before - list.len();
        prune(&mut records, &address.peer);
        if any_active {
            self.route.address_destroy(address);
        }
        if removed > 0 {
            log_peer_event!(
                debug,
                subsystem::ATS,
                "Address expired",
                address.peer,
                address = %address
            );
        }
    }

    fn block_address(&self, address: &Address, session: Option<SessionId>) {
        let now = self.time_source.now();
        let mut records = self.records.lock();
        let Some(record) = find(&mut records, address, session) else {
            log_peer_event!(
                debug,
                subsystem::ATS,
                "Cannot block unknown address",
                address.peer,
                address = %address
            );
            return;
        };
        if record.is_blocked() {
            return;
        }
        let back_off = record.block(now, &self.config);
        self.route.address_destroy(address);
        log_peer_event!(
            debug,
            subsystem::ATS,
            "Address blocked",
            address.peer,
            address = %address,
            back_off_ms = back_off.as_millis() as u64
        );
    }

    fn reset_block(&self, address: &Address, session: Option<SessionId>) {
        let mut records = self.records.lock();
        if let Some(record) = find(&mut records, address, session) {
            record.back_off = Duration::ZERO;
            record.blocked_until = shared_types::Timestamp::ZERO;
        }
    }

    fn request_suggestions(&self, peer: &PeerId) {
        self.route.suggest(peer);
    }

    fn cancel_suggestions(&self, peer: &PeerId) {
        self.route.suggest_cancel(peer);
    }
}
