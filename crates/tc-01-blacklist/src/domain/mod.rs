//! # Domain Layer
//!
//! Pure admission logic: the static denylist and the policy-client
//! round-robin. Nothing here performs I/O; the gate returns
//! [`GateAction`]s for the service to carry out.

pub mod config;
pub mod denylist;
pub mod errors;
pub mod gate;

pub use config::BlacklistConfig;
pub use denylist::{DenyScope, StaticDenylist};
pub use errors::BlacklistError;
pub use gate::{ClientId, GateAction, GateStats, RoundRobinGate};
