//! # Blacklist Gate
//!
//! **Subsystem ID:** 1
//!
//! Decides whether a peer (optionally on a given transport) may be used
//! before any SYN is sent or any PING goes out.
//!
//! ## Decision order
//!
//! 1. Static denylist: a peer-wide entry or a matching transport entry
//!    denies synchronously.
//! 2. No policy clients connected: allowed synchronously.
//! 3. Otherwise a check is created and the connected policy clients are
//!    asked one at a time, in connection order. The first denial ends the
//!    check; approval by the last client allows it. The verdict is queued
//!    and drained by the host ([`BlacklistService::drain_verdicts`]).
//!
//! Each client has a single in-flight slot. Checks waiting for a busy
//! client are served in creation order, so cancelling one check never
//! starves another queued on the same client.
//!
//! ## Architecture
//!
//! - **Domain Layer:** denylist and the round-robin step machine (no I/O)
//! - **Ports Layer:** [`BlacklistApi`] inbound, [`PolicyClientChannel`]
//!   outbound
//! - **Service Layer:** thread-safe [`BlacklistService`], also implementing
//!   the shared [`AdmissionControl`](shared_types::AdmissionControl) port

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
    BlacklistConfig, BlacklistError, ClientId, DenyScope, GateAction, GateStats, RoundRobinGate,
    StaticDenylist,
};
pub use ports::{BlacklistApi, PolicyClientChannel, PolicyQuery};
pub use service::BlacklistService;
