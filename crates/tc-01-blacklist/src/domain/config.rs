//! Blacklist configuration.

use shared_types::PeerId;

/// Static admission configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlacklistConfig {
    /// Denylist entries: a peer plus the transport it is denied on, or
    /// `None` for every transport.
    pub entries: Vec<(PeerId, Option<String>)>,
}

impl BlacklistConfig {
    /// Configuration with a single entry, for tests.
    pub fn for_testing(peer: PeerId, transport: Option<&str>) -> Self {
        Self {
            entries: vec![(peer, transport.map(str::to_string))],
        }
    }
}
