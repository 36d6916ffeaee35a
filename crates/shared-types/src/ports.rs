//! # Shared Driven Ports
//!
//! Interfaces more than one subsystem requires from its environment.
//!
//! ## Threading
//!
//! The core is single-threaded and cooperative, but ports are `Send + Sync`
//! so the host may keep them in `Arc` and drive the core from any tokio
//! task. Implementations must never call back into the subsystem that
//! invoked them; results that arrive later are fed in by the host.

use std::time::Duration;

use crate::entities::{
    Address, AddressProperties, NetworkType, PeerId, SendToken, SessionId, Timestamp,
};
use crate::errors::TransportError;
use crate::events::ClientEvent;

// =============================================================================
// TIME
// =============================================================================

/// Source of the current time.
///
/// Injected so tests can advance the clock deterministically.
pub trait TimeSource: Send + Sync {
    /// Current timestamp.
    fn now(&self) -> Timestamp;
}

// =============================================================================
// TRANSPORT PLUGINS
// =============================================================================

/// One message handed to a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    /// Address the session belongs to (selects the plugin).
    pub address: Address,
    /// Session to send on.
    pub session: SessionId,
    /// Encoded message bytes.
    pub payload: Vec<u8>,
    /// Relative priority; higher goes first.
    pub priority: u32,
    /// Give up after this long.
    pub timeout: Duration,
    /// When set, the host reports the outcome later with this token.
    pub token: Option<SendToken>,
}

/// The set of loaded wire-level transport plugins.
pub trait TransportPlugins: Send + Sync {
    /// Queue a message on a session.
    ///
    /// `Ok` means queued; if the request carries a token, the final outcome
    /// is reported to the core later. `Err` means nothing was queued and no
    /// completion will follow.
    fn send(&self, request: SendRequest) -> Result<(), TransportError>;

    /// Find or open a session for an address.
    fn get_session(&self, address: &Address) -> Option<SessionId>;

    /// Close a session.
    fn disconnect_session(&self, address: &Address, session: SessionId);

    /// Network classification of a session.
    fn network_type(&self, address: &Address, session: SessionId) -> NetworkType;

    /// Does the plugin for `transport` recognise `raw` as one of our own
    /// addresses?
    fn check_address(&self, transport: &str, raw: &[u8]) -> bool;
}

// =============================================================================
// ADMISSION (BLACKLIST)
// =============================================================================

/// Identifier of a pending blacklist check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckId(pub u64);

/// Question put to the admission gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRequest {
    /// Peer we want to talk to.
    pub peer: PeerId,
    /// Transport to use; `None` asks about the peer in general.
    pub transport: Option<String>,
    /// Address the check is about, for abort matching.
    pub address: Option<Address>,
    /// Session the check is about, for abort matching.
    pub session: Option<SessionId>,
}

impl AdmissionRequest {
    /// Ask about a peer on any transport.
    pub fn peer(peer: PeerId) -> Self {
        Self {
            peer,
            transport: None,
            address: None,
            session: None,
        }
    }

    /// Ask about a specific address (and optionally session).
    pub fn address(address: &Address, session: Option<SessionId>) -> Self {
        Self {
            peer: address.peer,
            transport: Some(address.transport.clone()),
            address: Some(address.clone()),
            session,
        }
    }
}

/// Immediate answer of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Allowed right away.
    Allowed,
    /// Denied right away.
    Denied,
    /// Policy clients are being asked; a [`Verdict`] for this id follows
    /// unless the check is cancelled.
    Pending(CheckId),
}

/// Final answer for a pending check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every policy client approved.
    Allowed,
    /// A policy client denied.
    Denied,
    /// The address or session the check was about went away first.
    Aborted,
}

/// Connection admission gate.
pub trait AdmissionControl: Send + Sync {
    /// Ask whether `request.peer` may be used.
    fn test_allowed(&self, request: AdmissionRequest) -> Admission;

    /// Cancel a pending check. No verdict is delivered for it afterwards.
    fn cancel(&self, check: CheckId);

    /// Abort every pending check about `address` (and `session`, if
    /// given); each gets a [`Verdict::Aborted`].
    fn abort_matching(&self, address: &Address, session: Option<SessionId>);
}

// =============================================================================
// ROUTE SELECTION (ATS BRIDGE)
// =============================================================================

/// Address bookkeeping towards the route-selection service.
pub trait AddressRegistry: Send + Sync {
    /// Is the (address, session) pair registered?
    fn is_known(&self, address: &Address, session: Option<SessionId>) -> bool;

    /// Is the address registered with any session (or none)?
    fn is_known_no_session(&self, address: &Address) -> bool;

    /// Register an address learned from an inbound session.
    fn add_inbound(&self, address: &Address, session: SessionId, props: AddressProperties);

    /// Register a validated outbound address.
    fn add_address(&self, address: &Address, props: AddressProperties);

    /// A session was opened for a registered address.
    fn new_session(&self, address: &Address, session: SessionId);

    /// A session for a registered address went away. Returns `true` when
    /// the address itself was dropped as a result (inbound addresses have
    /// no meaning without their session).
    fn del_session(&self, address: &Address, session: SessionId) -> bool;

    /// New latency measurement.
    fn update_delay(&self, address: &Address, delay: Duration);

    /// New distance measurement.
    fn update_distance(&self, address: &Address, distance: u32);

    /// New network classification.
    fn update_network(&self, address: &Address, network: NetworkType);

    /// Utilization in bytes/s.
    fn update_utilization(&self, address: &Address, bps_in: u32, bps_out: u32);

    /// Address validity ran out.
    fn expire_address(&self, address: &Address);

    /// Temporarily withdraw an address after a failure (exponential
    /// back-off).
    fn block_address(&self, address: &Address, session: Option<SessionId>);

    /// Clear the back-off of an address that just worked.
    fn reset_block(&self, address: &Address, session: Option<SessionId>);

    /// Start receiving address suggestions for a peer.
    fn request_suggestions(&self, peer: &PeerId);

    /// Stop receiving address suggestions for a peer.
    fn cancel_suggestions(&self, peer: &PeerId);
}

// =============================================================================
// CLIENTS AND PEER INFORMATION
// =============================================================================

/// Non-blocking, best-effort notification of local clients.
pub trait ClientNotifier: Send + Sync {
    /// Broadcast to every interested client.
    fn broadcast(&self, event: ClientEvent);
}

/// Persistent peer-information store.
pub trait PeerInfoStore: Send + Sync {
    /// Remember a validated address until `expiration`.
    fn add_address(&self, address: &Address, expiration: Timestamp);
}
