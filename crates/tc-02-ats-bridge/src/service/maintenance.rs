use shared_types::PeerId;
use transport_telemetry::{log_peer_event, subsystem};

use super::core::AtsBridge;

impl AtsBridge {
    /// Re-register blocked addresses whose back-off ran out. Returns how
    /// many came back.
    pub fn poll_unblock(&self) -> usize {
        let now = self.time_source.now();
        let mut records = self.records.lock();
        let mut count = 0;
        for record in records.values_mut().flatten() {
            if !record.unblock_due(now) {
                continue;
            }
            record.active = true;
            record.blocked_until = shared_types::Timestamp::ZERO;
            self.route
                .address_add(&record.address, record.session, &record.properties);
            log_peer_event!(
                debug,
                subsystem::ATS,
                "Address unblocked",
                record.address.peer,
                address = %record.address
            );
            count += 1;
        }
        count
    }

    /// Forget the block back-off of every address of `peer`, here and in
    /// the route-selection service.
    pub fn reset_backoff(&self, peer: &PeerId) {
        if let Some(list) = self.records.lock().get_mut(peer) {
            for record in list.iter_mut() {
                record.back_off = std::time::Duration::ZERO;
            }
        }
        self.route.reset_backoff(peer);
    }
}
