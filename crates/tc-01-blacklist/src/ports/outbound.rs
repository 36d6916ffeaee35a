//! # Driven Ports (Outbound SPI)

use shared_types::{CheckId, PeerId};

use crate::domain::ClientId;

/// Question sent to one policy client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyQuery {
    /// Client being asked.
    pub client: ClientId,
    /// Check to quote in the reply.
    pub check: CheckId,
    /// Peer in question.
    pub peer: PeerId,
    /// Transport in question, if any.
    pub transport: Option<String>,
}

/// Delivery of queries to connected policy clients.
///
/// Must not block and must not call back into the gate; the reply arrives
/// later through [`BlacklistApi::on_client_reply`](crate::BlacklistApi).
pub trait PolicyClientChannel: Send + Sync {
    /// Send a query.
    fn query(&self, query: PolicyQuery);
}
