//! # Ports Layer
//!
//! - **Driving Ports (Inbound):** [`BlacklistApi`], used by the host to
//!   manage policy clients, plus the shared
//!   [`AdmissionControl`](shared_types::AdmissionControl) port used by the
//!   other subsystems
//! - **Driven Ports (Outbound):** [`PolicyClientChannel`]

pub mod inbound;
pub mod outbound;

pub use inbound::BlacklistApi;
pub use outbound::{PolicyClientChannel, PolicyQuery};
