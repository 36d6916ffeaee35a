//! # Bandwidth Tracker
//!
//! Leaky bucket enforcing the inbound quota of one neighbour.
//!
//! ## Algorithm
//!
//! - Quota accrues at `bps` bytes per second of wall time
//! - Each received message is debited by its size
//! - Unused quota is carried over, capped at `bps * max_carry`
//! - A positive balance of consumption means the quota was exceeded

use shared_types::{Bandwidth, Timestamp};
use std::time::Duration;

/// Inbound quota tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandwidthTracker {
    /// Bytes consumed beyond the quota accrued so far; negative values are
    /// carried-over credit.
    consumption: i64,
    last_update: Timestamp,
    bps: Bandwidth,
    max_carry: Duration,
}

impl BandwidthTracker {
    /// Create a tracker with no credit.
    pub fn new(now: Timestamp, bps: Bandwidth, max_carry: Duration) -> Self {
        Self {
            consumption: 0,
            last_update: now,
            bps,
            max_carry,
        }
    }

    /// Current quota.
    pub fn quota(&self) -> Bandwidth {
        self.bps
    }

    /// Accrue quota for the time elapsed since the last update.
    fn update(&mut self, now: Timestamp) {
        let elapsed = now.saturating_duration_since(self.last_update);
        let bps = i64::from(self.bps.bytes_per_sec());
        let accrued = bps.saturating_mul(elapsed.as_millis() as i64) / 1_000;
        self.consumption = self.consumption.saturating_sub(accrued);
        let max_carry = bps.saturating_mul(self.max_carry.as_millis() as i64) / 1_000;
        if -self.consumption > max_carry {
            self.consumption = -max_carry;
        }
        self.last_update = now;
    }

    /// Debit `size` bytes. Returns `true` when the quota is now exceeded.
    pub fn consume(&mut self, now: Timestamp, size: i64) -> bool {
        self.consumption = self.consumption.saturating_add(size);
        self.update(now);
        self.consumption > 0
    }

    /// How long until `size` more bytes fit into the quota.
    pub fn get_delay(&mut self, now: Timestamp, size: usize) -> Duration {
        if self.bps.is_zero() {
            return Duration::MAX;
        }
        self.update(now);
        let size = size as i64;
        if -self.consumption >= size {
            return Duration::ZERO;
        }
        let needed = (size + self.consumption) as u64;
        Duration::from_millis(needed.saturating_mul(1_000) / u64::from(self.bps.bytes_per_sec()))
    }

    /// Change the quota; time up to `now` accrues at the old rate.
    pub fn update_quota(&mut self, now: Timestamp, bps: Bandwidth) {
        self.update(now);
        self.bps = bps;
    }
}
