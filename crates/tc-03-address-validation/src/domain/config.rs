//! Validation timing configuration.

use std::time::Duration;

/// Timing constants of the validation protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Revalidation period while a neighbour uses the address.
    pub connected_ping_frequency: Duration,
    /// Revalidation period while the address is valid but unused.
    pub validated_ping_frequency: Duration,
    /// Revalidation period for addresses never (or no longer) validated.
    pub unvalidated_ping_keepalive: Duration,
    /// An unanswered PING is given up after this long.
    pub ping_timeout: Duration,
    /// Validity granted by a good PONG; also how long an idle entry lives.
    pub hello_address_expiration: Duration,
    /// Lifetime of a PONG signature we create.
    pub pong_signature_lifetime: Duration,
    /// File-descriptor budget; drives PING pacing.
    pub max_fds: u32,
    /// In-flight PINGs allowed before pacing starts (default `max_fds / 2`).
    pub fast_start_threshold: Option<u32>,
    /// Base for the global inter-PING delay.
    pub idle_connection_timeout: Duration,
    /// Send priority of PINGs and PONGs.
    pub priority: u32,
    /// Plugin send timeout for PINGs and PONGs.
    pub send_timeout: Duration,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            connected_ping_frequency: Duration::from_secs(2 * 60),
            validated_ping_frequency: Duration::from_secs(15 * 60),
            unvalidated_ping_keepalive: Duration::from_secs(30 * 60),
            ping_timeout: Duration::from_secs(30),
            hello_address_expiration: Duration::from_secs(12 * 60 * 60),
            pong_signature_lifetime: Duration::from_secs(60 * 60),
            max_fds: 1024,
            fast_start_threshold: None,
            idle_connection_timeout: Duration::from_secs(5 * 60),
            priority: 2,
            send_timeout: Duration::from_secs(1),
        }
    }
}

impl ValidationConfig {
    /// Small file-descriptor budget so pacing is easy to trigger.
    pub fn for_testing() -> Self {
        Self {
            max_fds: 4,
            ..Self::default()
        }
    }

    /// In-flight PINGs allowed before pacing starts.
    pub fn fast_start_threshold(&self) -> u32 {
        self.fast_start_threshold.unwrap_or(self.max_fds / 2)
    }

    /// Minimum gap between PINGs once pacing applies.
    pub fn validation_delay(&self) -> Duration {
        self.idle_connection_timeout / self.max_fds.max(1)
    }
}
