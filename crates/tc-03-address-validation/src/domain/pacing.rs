//! Global PING pacing.
//!
//! Below the fast-start threshold every due PING goes out at once. Above
//! it, consecutive PINGs are spaced by the validation delay.

use shared_types::Timestamp;
use std::time::Duration;

/// Running PING count and the earliest time the next paced PING may go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingBudget {
    running: u32,
    next_allowed: Timestamp,
}

impl PingBudget {
    /// Empty budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// PINGs currently awaiting a PONG.
    pub fn running(&self) -> u32 {
        self.running
    }

    /// How long a revalidation must wait, if at all.
    pub fn blocked_for(&self, now: Timestamp, threshold: u32) -> Option<Duration> {
        if self.running > threshold && self.next_allowed > now {
            Some(self.next_allowed.remaining(now))
        } else {
            None
        }
    }

    /// A revalidation is about to start.
    pub fn on_revalidate(&mut self, now: Timestamp, delay: Duration) {
        self.next_allowed = now.saturating_add(delay);
    }

    /// A PING went out.
    pub fn on_ping_sent(&mut self, now: Timestamp, delay: Duration) {
        self.next_allowed = self.next_allowed.max(now.saturating_add(delay));
        self.running += 1;
    }

    /// A PING was answered or given up.
    pub fn on_ping_done(&mut self) {
        self.running = self.running.saturating_sub(1);
    }
}
