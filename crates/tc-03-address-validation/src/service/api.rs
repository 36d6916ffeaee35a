use shared_types::{Address, HelloMessage, Timestamp};
use std::time::Duration;
use transport_telemetry::{log_event, subsystem};

use crate::domain::EntrySnapshot;
use crate::ports::AddressValidationApi;
use crate::service::AddressValidationService;

/// Validation entries are keyed by the outbound form of an address.
fn key(address: &Address) -> Address {
    Address::new(address.peer, address.transport.clone(), address.raw.clone())
}

impl AddressValidationApi for AddressValidationService {
    fn handle_address(&self, address: &Address, expiration: Timestamp) -> bool {
        let now = self.now();
        if expiration <= now || address.inbound {
            return false;
        }
        let mut table = self.table.lock();
        if !self.ensure_entry(&mut table, address, now) {
            return false;
        }
        self.revalidate_due(&mut table, now);
        true
    }

    fn set_address_use(&self, address: &Address, in_use: bool) {
        if address.inbound {
            return;
        }
        let now = self.now();
        let mut table = self.table.lock();
        let Some(entry) = table.entries.get_mut(&key(address)) else {
            return;
        };
        if entry.in_use == in_use {
            return;
        }
        entry.in_use = in_use;
        if in_use {
            entry.next_validation = Some(now);
            self.revalidate_due(&mut table, now);
        }
    }

    fn get_latency(&self, address: &Address) -> Option<Duration> {
        self.table
            .lock()
            .entries
            .get(&key(address))
            .and_then(|e| e.latency)
    }

    fn add_own_address(&self, transport: &str, raw: &[u8]) -> bool {
        let added = self.table.lock().own.add(transport, raw);
        if added {
            log_event!(info, subsystem::VALIDATION, "Own address added", transport = transport);
        }
        added
    }

    fn remove_own_address(&self, transport: &str, raw: &[u8]) -> bool {
        let removed = self.table.lock().own.remove(transport, raw);
        if removed {
            log_event!(info, subsystem::VALIDATION, "Own address removed", transport = transport);
        }
        removed
    }

    fn own_hello(&self) -> HelloMessage {
        let expiration = self
            .now()
            .saturating_add(self.config.hello_address_expiration);
        self.table.lock().own.hello(self.local, expiration)
    }

    fn entries(&self) -> Vec<EntrySnapshot> {
        self.table
            .lock()
            .entries
            .values()
            .map(|e| e.snapshot())
            .collect()
    }

    fn entry(&self, address: &Address) -> Option<EntrySnapshot> {
        self.table
            .lock()
            .entries
            .get(&key(address))
            .map(|e| e.snapshot())
    }
}
