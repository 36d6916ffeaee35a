//! # Shared Types Crate
//!
//! Types that cross subsystem boundaries inside the transport core.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: peer identities, addresses, sessions and the
//!   wire codec are defined once and used by the blacklist gate, the ATS
//!   bridge, address validation and the neighbour state machine.
//! - **Capabilities, not pointers**: a [`SessionId`] is an opaque token handed
//!   out by a transport plugin. Holding one proves nothing; every use goes
//!   back through [`TransportPlugins`] which may report it gone.
//! - **Ports live here**: the driven ports that more than one subsystem needs
//!   ([`TransportPlugins`], [`AdmissionControl`], [`AddressRegistry`], ...)
//!   are declared in [`ports`] so the subsystems never depend on each other.

pub mod entities;
pub mod errors;
pub mod events;
pub mod ports;
pub mod wire;

pub use entities::*;
pub use errors::*;
pub use events::*;
pub use ports::*;
pub use wire::{
    HelloEntry, HelloMessage, PingMessage, PongMessage, DisconnectMessage, SynMessage,
    WireMessage,
};

/// Recording port implementations for tests.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
