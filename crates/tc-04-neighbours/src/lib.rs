//! # Neighbours
//!
//! **Subsystem ID:** 4
//!
//! One entry per remote peer, tracking the connection from the first SYN
//! (or the first connect request) to teardown.
//!
//! ## State machine
//!
//! ```text
//! NotConnected -> InitAts -> SynSent -----------------> Connected
//!             \-> SynRecvAts -> SynRecvAck ----------/   |   ^
//!                                                        v   |
//!                             SwitchSynSent <--------- Connected
//!                             ReconnectAts -> ReconnectSent -/
//!                    any -> Disconnect -> DisconnectFinished
//! ```
//!
//! Each state is a variant of [`NeighbourState`] carrying exactly the
//! address slots valid in it: `SwitchSynSent` holds both the primary and
//! the alternative, `ReconnectAts` holds none. Every state has a deadline;
//! [`NeighbourService::poll`] applies the fallback when it passes.
//!
//! ## Sessions
//!
//! An [`AddressSlot`] owns an address copy and an opaque session token.
//! Slots are released through one teardown path that unregisters the
//! address from validation and, on full teardown, closes the session.
//!
//! ## Generations
//!
//! Each entry gets a fresh generation number when created. Pending
//! blacklist checks and in-flight sends remember the generation they were
//! started for, so a verdict or completion that arrives after the entry
//! was freed and recreated is ignored.

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod domain;
pub mod ports;
pub mod service;

/// Recording adapters for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod adapters;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use domain::{
    AckState, AddressSlot, BandwidthTracker, DisconnectRejectReason, InboundVerdict,
    MessageQueue, NeighbourConfig, NeighbourEntry, NeighbourError, NeighbourInfo,
    NeighbourState, QueuedMessage,
};
pub use ports::{AddressUsage, NeighbourApi, NeighbourMessageHandler, NeighbourPorts};
pub use service::NeighbourService;
