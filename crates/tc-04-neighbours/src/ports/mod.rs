//! # Ports Layer
//!
//! - **Driving Ports (Inbound):** the client-facing API and the handlers
//!   for handshake, keepalive, quota and DISCONNECT messages
//! - **Driven Ports (Outbound):** the shared ports plus [`AddressUsage`],
//!   bundled in [`NeighbourPorts`]

pub mod inbound;
pub mod outbound;

pub use inbound::{NeighbourApi, NeighbourMessageHandler};
pub use outbound::{AddressUsage, NeighbourPorts};
