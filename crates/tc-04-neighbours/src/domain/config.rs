//! Neighbour timing and quota configuration.

use shared_types::Bandwidth;
use std::time::Duration;

/// Timing constants of the neighbour state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighbourConfig {
    /// How long to wait for the route-selection service to suggest an
    /// address.
    pub ats_response_timeout: Duration,
    /// How long to wait for SYN_ACK or ACK.
    pub setup_connection_timeout: Duration,
    /// How long a fast reconnect may take.
    pub fast_reconnect_timeout: Duration,
    /// A connected neighbour without keepalive responses for this long is
    /// disconnected.
    pub idle_connection_timeout: Duration,
    /// Interval between keepalives.
    pub keepalive_frequency: Duration,
    /// Flush time for a DISCONNECT before the entry is freed.
    pub disconnect_sent_timeout: Duration,
    /// Interval of utilization reports to the bridge.
    pub util_transmission_interval: Duration,
    /// Quota violations tolerated before reads are throttled.
    pub quota_violation_throttle_threshold: u32,
    /// Read delay imposed on a throttled neighbour.
    pub quota_violation_timeout: Duration,
    /// Bytes credited back or debited per quota violation.
    pub max_fragmentation_unit: u32,
    /// Unused inbound quota carried over, in seconds of bandwidth.
    pub max_bandwidth_carry: Duration,
    /// Inbound and outbound quota before the first suggestion.
    pub default_bandwidth: Bandwidth,
    /// Priority of handshake and control messages.
    pub control_priority: u32,
    /// Plugin send timeout for control messages.
    pub control_timeout: Duration,
}

impl Default for NeighbourConfig {
    fn default() -> Self {
        let idle = Duration::from_secs(5 * 60);
        Self {
            ats_response_timeout: Duration::from_secs(5),
            setup_connection_timeout: Duration::from_secs(15),
            fast_reconnect_timeout: Duration::from_secs(1),
            idle_connection_timeout: idle,
            keepalive_frequency: idle / 2,
            disconnect_sent_timeout: Duration::from_millis(500),
            util_transmission_interval: Duration::from_secs(1),
            quota_violation_throttle_threshold: 10,
            quota_violation_timeout: Duration::from_secs(2),
            max_fragmentation_unit: 32 * 1024,
            max_bandwidth_carry: Duration::from_secs(5),
            default_bandwidth: Bandwidth::new(64 * 1024),
            control_priority: u32::MAX,
            control_timeout: Duration::from_secs(1),
        }
    }
}

impl NeighbourConfig {
    /// Same constants; kept for symmetry with the other subsystems.
    pub fn for_testing() -> Self {
        Self::default()
    }
}
