//! Per-address bookkeeping.

use shared_types::{Address, AddressProperties, SessionId, Timestamp};
use std::time::Duration;

use super::config::AtsBridgeConfig;

/// What the bridge remembers about one (address, session) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    /// The address.
    pub address: Address,
    /// Attached session, if any.
    pub session: Option<SessionId>,
    /// Last reported metrics.
    pub properties: AddressProperties,
    /// Currently registered with the route-selection service.
    pub active: bool,
    /// Withdrawn until this time (zero when not blocked).
    pub blocked_until: Timestamp,
    /// Back-off applied at the next block.
    pub back_off: Duration,
}

impl AddressRecord {
    /// Fresh, active record.
    pub fn new(address: Address, session: Option<SessionId>, properties: AddressProperties) -> Self {
        Self {
            address,
            session,
            properties,
            active: true,
            blocked_until: Timestamp::ZERO,
            back_off: Duration::ZERO,
        }
    }

    /// True while withdrawn.
    pub fn is_blocked(&self) -> bool {
        !self.active
    }

    /// Withdraw the record until `now + back-off`, growing the back-off.
    pub fn block(&mut self, now: Timestamp, config: &AtsBridgeConfig) -> Duration {
        self.back_off = next_back_off(self.back_off, config);
        self.active = false;
        self.blocked_until = now.saturating_add(self.back_off);
        self.back_off
    }

    /// Whether a blocked record may come back at `now`.
    pub fn unblock_due(&self, now: Timestamp) -> bool {
        !self.active && self.blocked_until <= now
    }
}

/// Doubling back-off: at least `min_back_off`, at most `max_back_off`.
pub fn next_back_off(current: Duration, config: &AtsBridgeConfig) -> Duration {
    current
        .saturating_mul(2)
        .max(config.min_back_off)
        .min(config.max_back_off)
}
