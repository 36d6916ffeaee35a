use shared_types::{Address, CheckId, Verdict};
use transport_telemetry::{log_event, log_peer_event, subsystem};

use crate::service::AddressValidationService;

impl AddressValidationService {
    /// Timer work: PING timeouts, garbage collection, due revalidations and
    /// signature cache pruning, in that order.
    ///
    /// Call from the host tick. Returns the number of revalidations run.
    pub fn poll(&self) -> usize {
        let now = self.now();
        let mut table = self.table.lock();
        let table = &mut *table;

        for entry in table.entries.values_mut() {
            if entry.expecting_pong
                && entry.send_time.saturating_add(self.config.ping_timeout) <= now
            {
                log_peer_event!(
                    debug,
                    subsystem::VALIDATION,
                    "PING timed out",
                    entry.address.peer,
                    address = %entry.address
                );
                entry.expecting_pong = false;
                table.budget.on_ping_done();
            }
        }

        let mut expired: Vec<Address> = Vec::new();
        for entry in table.entries.values_mut() {
            if entry.timeout_at > now {
                continue;
            }
            let deadline = entry.idle_deadline();
            if deadline > now || entry.pending_check.is_some() {
                entry.timeout_at = deadline.max(now.saturating_add(self.config.ping_timeout));
                continue;
            }
            expired.push(entry.address.clone());
        }
        for address in &expired {
            self.remove_entry(table, address);
        }

        let revalidated = self.revalidate_due(table, now);

        let pruned = table.signatures.prune(now);
        if revalidated > 0 || !expired.is_empty() || pruned > 0 {
            log_event!(
                trace,
                subsystem::VALIDATION,
                "Validation poll",
                revalidated = revalidated,
                collected = expired.len(),
                signatures_pruned = pruned
            );
        }
        revalidated
    }

    /// Route a blacklist verdict. Returns `false` if the check was not
    /// started by validation.
    pub fn on_blacklist_verdict(&self, check: CheckId, verdict: Verdict) -> bool {
        let now = self.now();
        let mut table = self.table.lock();
        let Some(address) = table.pending.remove(&check) else {
            return false;
        };
        match table.entries.get_mut(&address) {
            Some(entry) if entry.pending_check == Some(check) => entry.pending_check = None,
            _ => return true,
        }
        match verdict {
            Verdict::Allowed => self.transmit_ping(&mut table, &address, now),
            Verdict::Denied | Verdict::Aborted => {
                log_peer_event!(
                    debug,
                    subsystem::VALIDATION,
                    "PING not allowed by blacklist",
                    address.peer,
                    address = %address,
                    verdict = ?verdict
                );
            }
        }
        true
    }

    /// Drop every entry, unregistering validated addresses. Returns how
    /// many entries were dropped.
    pub fn stop(&self) -> usize {
        let mut table = self.table.lock();
        let addresses: Vec<Address> = table.entries.keys().cloned().collect();
        for address in &addresses {
            self.remove_entry(&mut table, address);
        }
        log_event!(
            info,
            subsystem::VALIDATION,
            "Address validation stopped",
            entries = addresses.len()
        );
        addresses.len()
    }
}
