//! Address slots.

use shared_types::{Address, Bandwidth, SessionId, Timestamp};

/// An address in use by a neighbour, with the session it runs over.
///
/// The session is an opaque token: every use goes back through the
/// transport plugins, which may report it gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSlot {
    /// Address copy owned by the slot.
    pub address: Address,
    /// Session token handed out by the plugin.
    pub session: SessionId,
    /// Negotiated inbound quota.
    pub bandwidth_in: Bandwidth,
    /// Negotiated outbound quota.
    pub bandwidth_out: Bandwidth,
    /// Registered as in use with address validation.
    pub in_use: bool,
    /// Nonce of the outstanding keepalive.
    pub keep_alive_nonce: u32,
    /// Timestamp of the last SYN sent on this slot.
    pub connect_timestamp: Timestamp,
}

impl AddressSlot {
    /// Fresh slot.
    pub fn new(
        address: Address,
        session: SessionId,
        bandwidth_in: Bandwidth,
        bandwidth_out: Bandwidth,
    ) -> Self {
        Self {
            address,
            session,
            bandwidth_in,
            bandwidth_out,
            in_use: false,
            keep_alive_nonce: 0,
            connect_timestamp: Timestamp::ZERO,
        }
    }

    /// Same address and session.
    pub fn matches(&self, address: &Address, session: SessionId) -> bool {
        self.address == *address && self.session == session
    }
}
