//! Bridge configuration.

use std::time::Duration;

/// Back-off limits for blocked addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtsBridgeConfig {
    /// First back-off period.
    pub min_back_off: Duration,
    /// Back-off never exceeds this.
    pub max_back_off: Duration,
}

impl Default for AtsBridgeConfig {
    fn default() -> Self {
        Self {
            min_back_off: Duration::from_millis(1),
            max_back_off: Duration::from_secs(15 * 60),
        }
    }
}
