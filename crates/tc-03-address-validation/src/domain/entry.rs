//! Validation entries.

use shared_types::{Address, CheckId, NetworkType, Timestamp, ValidationState};
use std::time::Duration;

use super::config::ValidationConfig;

/// Which revalidation period applies to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidationTier {
    /// A neighbour uses the address.
    Connected,
    /// Valid, unused.
    Validated,
    /// Never validated, or validity ran out.
    Unvalidated,
}

impl RevalidationTier {
    /// Base period for this tier.
    pub fn delay(self, config: &ValidationConfig) -> Duration {
        match self {
            Self::Connected => config.connected_ping_frequency,
            Self::Validated => config.validated_ping_frequency,
            Self::Unvalidated => config.unvalidated_ping_keepalive,
        }
    }
}

/// State kept per (peer, address).
#[derive(Debug, Clone)]
pub struct ValidationEntry {
    /// Address being validated (never inbound).
    pub address: Address,
    /// Challenge of the outstanding PING.
    pub challenge: u32,
    /// When the last PING went out.
    pub send_time: Timestamp,
    /// When the next revalidation runs; `None` when none is scheduled.
    pub next_validation: Option<Timestamp>,
    /// End of validity; zero means never validated.
    pub valid_until: Timestamp,
    /// No PING before this time.
    pub revalidation_block: Timestamp,
    /// Next garbage-collection check.
    pub timeout_at: Timestamp,
    /// Last accepted PONG signature.
    pub pong_signature: Option<[u8; 64]>,
    /// Expiration carried by that signature.
    pub pong_signature_valid_until: Timestamp,
    /// Round-trip time of the last successful PING.
    pub latency: Option<Duration>,
    /// Network classification reported by the plugin.
    pub network: NetworkType,
    /// Network classification last published to the bridge.
    pub reported_network: NetworkType,
    /// A neighbour currently uses this address.
    pub in_use: bool,
    /// A PING is outstanding.
    pub expecting_pong: bool,
    /// Registered with the route-selection bridge.
    pub known_to_ats: bool,
    /// Admission check in progress for the next PING.
    pub pending_check: Option<CheckId>,
    /// Last state reported to monitors.
    pub state: ValidationState,
}

impl ValidationEntry {
    /// New, never-validated entry.
    pub fn new(address: Address, challenge: u32, now: Timestamp, config: &ValidationConfig) -> Self {
        Self {
            address,
            challenge,
            send_time: Timestamp::ZERO,
            next_validation: None,
            valid_until: Timestamp::ZERO,
            revalidation_block: Timestamp::ZERO,
            timeout_at: now.saturating_add(config.hello_address_expiration),
            pong_signature: None,
            pong_signature_valid_until: Timestamp::ZERO,
            latency: None,
            network: NetworkType::Unspecified,
            reported_network: NetworkType::Unspecified,
            in_use: false,
            expecting_pong: false,
            known_to_ats: false,
            pending_check: None,
            state: ValidationState::New,
        }
    }

    /// Valid at `now`.
    pub fn is_valid(&self, now: Timestamp) -> bool {
        self.valid_until > now
    }

    /// Revalidation tier at `now`.
    pub fn tier(&self, now: Timestamp) -> RevalidationTier {
        if self.in_use {
            RevalidationTier::Connected
        } else if self.is_valid(now) {
            RevalidationTier::Validated
        } else {
            RevalidationTier::Unvalidated
        }
    }

    /// Extend validity to `until`; never moves it backwards.
    pub fn extend_validity(&mut self, until: Timestamp) {
        self.valid_until = self.valid_until.max(until);
    }

    /// Whether the cached signature can stand in for verification. The
    /// expiration must be the one the cached signature was made over.
    pub fn cached_signature_matches(
        &self,
        signature: &[u8; 64],
        expiration: Timestamp,
        now: Timestamp,
    ) -> bool {
        self.pong_signature_valid_until > now
            && self.pong_signature_valid_until == expiration
            && self.pong_signature.as_ref() == Some(signature)
    }

    /// Point after which the entry may be collected.
    pub fn idle_deadline(&self) -> Timestamp {
        self.valid_until.max(self.revalidation_block)
    }

    /// Monitoring view.
    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            address: self.address.clone(),
            state: self.state,
            last_validation: self.send_time,
            valid_until: self.valid_until,
            next_validation: self.next_validation.unwrap_or(Timestamp::ZERO),
            latency: self.latency,
            network: self.network,
            in_use: self.in_use,
            expecting_pong: self.expecting_pong,
        }
    }
}

/// Read-only view of a validation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub address: Address,
    pub state: ValidationState,
    pub last_validation: Timestamp,
    pub valid_until: Timestamp,
    pub next_validation: Timestamp,
    pub latency: Option<Duration>,
    pub network: NetworkType,
    pub in_use: bool,
    pub expecting_pong: bool,
}
