//! Neighbour entries.

use shared_types::{Address, Bandwidth, ConnectionState, PeerId, Timestamp};
use std::time::Duration;

use super::bandwidth::BandwidthTracker;
use super::config::NeighbourConfig;
use super::queue::MessageQueue;
use super::state::NeighbourState;

/// Which handshake message still owes a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckState {
    /// Nothing owed.
    #[default]
    Undefined,
    /// Received a SYN; SYN_ACK not sent yet.
    MustSendSynAck,
    /// Received a SYN_ACK; ACK not sent yet.
    MustSendAck,
}

/// Everything known about one neighbour.
#[derive(Debug)]
pub struct NeighbourEntry {
    /// Remote peer.
    pub peer: PeerId,
    /// Current state, with its address slots.
    pub state: NeighbourState,
    /// Deadline of the current state.
    pub timeout: Timestamp,
    /// Distinguishes this entry from an earlier one for the same peer.
    pub generation: u64,
    /// Handshake retry bookkeeping.
    pub ack_state: AckState,
    /// Timestamp of the last SYN received; echoed in our SYN_ACK.
    pub connect_ack_timestamp: Timestamp,
    /// Client payloads waiting for the primary session.
    pub queue: MessageQueue,
    /// Inbound quota enforcement.
    pub in_tracker: BandwidthTracker,
    /// Consecutive inbound quota violations.
    pub quota_violation_count: u32,
    /// Next keepalive.
    pub keep_alive_time: Timestamp,
    /// When the last keepalive went out.
    pub last_keep_alive_time: Timestamp,
    /// A keepalive response is outstanding.
    pub expect_latency_response: bool,
    /// Last keepalive round trip.
    pub latency: Option<Duration>,
    /// Quota the neighbour imposed on us.
    pub neighbour_receive_quota: Bandwidth,
    /// Bytes received since the last utilization report.
    pub util_bytes_in: u64,
    /// Bytes sent since the last utilization report.
    pub util_bytes_out: u64,
    /// Address suggestions were requested for this peer.
    pub suggestions_active: bool,
    /// Clients were told the peer is connected.
    pub notified_connected: bool,
}

impl NeighbourEntry {
    /// Fresh entry in `NotConnected`.
    pub fn new(peer: PeerId, generation: u64, now: Timestamp, config: &NeighbourConfig) -> Self {
        Self {
            peer,
            state: NeighbourState::NotConnected,
            timeout: now,
            generation,
            ack_state: AckState::Undefined,
            connect_ack_timestamp: Timestamp::ZERO,
            queue: MessageQueue::new(),
            in_tracker: BandwidthTracker::new(
                now,
                config.default_bandwidth,
                config.max_bandwidth_carry,
            ),
            quota_violation_count: 0,
            keep_alive_time: Timestamp::ZERO,
            last_keep_alive_time: Timestamp::ZERO,
            expect_latency_response: false,
            latency: None,
            neighbour_receive_quota: config.default_bandwidth,
            util_bytes_in: 0,
            util_bytes_out: 0,
            suggestions_active: false,
            notified_connected: false,
        }
    }

    /// Flat state.
    pub fn kind(&self) -> ConnectionState {
        self.state.kind()
    }

    /// Monitoring snapshot.
    pub fn info(&self) -> NeighbourInfo {
        let primary = self.state.primary();
        NeighbourInfo {
            peer: self.peer,
            state: self.kind(),
            state_timeout: self.timeout,
            address: primary.map(|s| s.address.clone()),
            bandwidth_in: primary.map_or(Bandwidth::ZERO, |s| s.bandwidth_in),
            bandwidth_out: primary.map_or(Bandwidth::ZERO, |s| s.bandwidth_out),
            latency: self.latency,
            queued: self.queue.len(),
        }
    }
}

/// Monitoring view of a neighbour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighbourInfo {
    /// Remote peer.
    pub peer: PeerId,
    /// Flat state.
    pub state: ConnectionState,
    /// Deadline of the state.
    pub state_timeout: Timestamp,
    /// Primary address, if any.
    pub address: Option<Address>,
    /// Inbound quota.
    pub bandwidth_in: Bandwidth,
    /// Outbound quota.
    pub bandwidth_out: Bandwidth,
    /// Keepalive round trip.
    pub latency: Option<Duration>,
    /// Queued client payloads.
    pub queued: usize,
}

/// What to do with data just received from a neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundVerdict {
    /// Wait this long before reading from the peer again.
    pub delay: Duration,
    /// Pass the message on; `false` only for peers we do not know.
    pub forward: bool,
}
