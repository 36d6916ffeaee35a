//! # Route-Selection Bridge
//!
//! **Subsystem ID:** 2
//!
//! Keeps track of which addresses (and sessions) the route-selection
//! service ("ATS") knows about, forwards metric updates, and withdraws
//! failing addresses for an exponentially growing back-off period.
//!
//! ## Address records
//!
//! - Outbound addresses are registered once validated, without a session;
//!   a session is attached when a plugin opens one.
//! - Inbound addresses are registered together with the session they
//!   arrived on and disappear with it.
//! - A blocked address is withdrawn from the route-selection service and
//!   re-added by [`AtsBridge::poll_unblock`] once its back-off ran out.
//!   Back-off starts at 1 ms, doubles per block and is capped at 15 min.

pub mod domain;
pub mod ports;
pub mod service;

/// Recording adapters for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod adapters;

pub use domain::{next_back_off, AddressRecord, AtsBridgeConfig};
pub use ports::RouteSelectionService;
pub use service::AtsBridge;
