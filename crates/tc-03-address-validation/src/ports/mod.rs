//! # Ports Layer
//!
//! - **Driving Ports (Inbound):** the host-facing API and the handlers for
//!   HELLO, PING and PONG messages
//! - **Driven Ports (Outbound):** the shared ports this subsystem uses,
//!   bundled in [`ValidationPorts`]

pub mod inbound;
pub mod outbound;

pub use inbound::{AddressValidationApi, ValidationMessageHandler};
pub use outbound::ValidationPorts;
