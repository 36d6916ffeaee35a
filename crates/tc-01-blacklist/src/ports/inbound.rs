//! # Driving Ports (Inbound API)

use shared_types::{CheckId, PeerId, Verdict};

use crate::domain::{BlacklistError, ClientId, GateStats};

/// Host-facing API of the blacklist gate.
pub trait BlacklistApi {
    /// A policy client connected. It joins the end of the rotation.
    fn add_client(&self, client: ClientId) -> Result<(), BlacklistError>;

    /// A policy client disconnected. Checks waiting on it move on.
    fn remove_client(&self, client: ClientId) -> Result<(), BlacklistError>;

    /// A policy client answered the query it has in flight.
    fn on_client_reply(
        &self,
        client: ClientId,
        check: CheckId,
        allowed: bool,
    ) -> Result<(), BlacklistError>;

    /// Add a static entry (`None` denies every transport).
    fn deny_static(&self, peer: PeerId, transport: Option<&str>);

    /// Take every verdict produced since the last call, in order.
    fn drain_verdicts(&self) -> Vec<(CheckId, Verdict)>;

    /// Load snapshot.
    fn stats(&self) -> GateStats;
}
