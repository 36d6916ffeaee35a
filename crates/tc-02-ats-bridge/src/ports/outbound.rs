//! # Driven Ports (Outbound SPI)

use shared_types::{Address, AddressProperties, PeerId, SessionId};

/// The external route-selection service.
///
/// Suggestions flow the other way: the host feeds them into the neighbour
/// subsystem.
pub trait RouteSelectionService: Send + Sync {
    /// Make an address (with an optional session) available for selection.
    fn address_add(&self, address: &Address, session: Option<SessionId>, props: &AddressProperties);

    /// New metrics for a registered address.
    fn address_update(&self, address: &Address, session: Option<SessionId>, props: &AddressProperties);

    /// A session was opened for a registered address.
    fn address_add_session(&self, address: &Address, session: SessionId);

    /// A session of a registered address went away; the address stays.
    fn address_del_session(&self, address: &Address, session: SessionId);

    /// Withdraw an address.
    fn address_destroy(&self, address: &Address);

    /// Start suggesting addresses for `peer`.
    fn suggest(&self, peer: &PeerId);

    /// Stop suggesting addresses for `peer`.
    fn suggest_cancel(&self, peer: &PeerId);

    /// Forget the selection back-off kept for `peer`.
    fn reset_backoff(&self, peer: &PeerId);
}
