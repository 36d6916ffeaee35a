//! # Driving Ports (Inbound API)

use shared_types::{
    Address, Bandwidth, DisconnectMessage, PeerId, SendToken, SessionId, SynMessage,
};
use std::time::Duration;

use crate::domain::{InboundVerdict, NeighbourError, NeighbourInfo};

/// Client- and route-selection-facing API.
pub trait NeighbourApi {
    /// Start connecting to `peer`. A no-op while a connection exists or
    /// is being set up.
    fn try_connect(&self, peer: &PeerId) -> Result<(), NeighbourError>;

    /// The route-selection service suggests `address` for its peer.
    ///
    /// Zero bandwidth in both directions means "stop using this peer".
    fn on_address_suggestion(
        &self,
        address: &Address,
        session: Option<SessionId>,
        bandwidth_in: Bandwidth,
        bandwidth_out: Bandwidth,
    );

    /// Disconnect from `peer`. Without `forced`, a signed DISCONNECT is
    /// sent first and the entry lingers until it flushed.
    fn disconnect(&self, peer: &PeerId, forced: bool);

    /// Queue a client payload (header included) for a connected peer.
    /// The outcome is reported as `SendComplete` with `receipt`.
    fn send(
        &self,
        peer: &PeerId,
        payload: Vec<u8>,
        timeout: Duration,
        receipt: u64,
    ) -> Result<(), NeighbourError>;

    /// Has the handshake with `peer` completed?
    fn is_connected(&self, peer: &PeerId) -> bool;

    /// Snapshot of every neighbour.
    fn iterate(&self) -> Vec<NeighbourInfo>;

    /// Snapshot of one neighbour.
    fn info(&self, peer: &PeerId) -> Option<NeighbourInfo>;
}

/// Handlers for messages and plugin callbacks.
///
/// Errors are protocol-level rejects; the host logs and drops the message.
pub trait NeighbourMessageHandler {
    /// Remote side wants to connect.
    fn handle_syn(&self, peer: &PeerId, syn: &SynMessage) -> Result<(), NeighbourError>;

    /// Answer to our SYN, received over `address`/`session`.
    fn handle_syn_ack(
        &self,
        peer: &PeerId,
        syn: &SynMessage,
        address: &Address,
        session: SessionId,
    ) -> Result<(), NeighbourError>;

    /// Final handshake message.
    fn handle_ack(
        &self,
        peer: &PeerId,
        address: &Address,
        session: SessionId,
    ) -> Result<(), NeighbourError>;

    /// Signed request to tear the connection down.
    fn handle_disconnect_message(
        &self,
        peer: &PeerId,
        message: &DisconnectMessage,
    ) -> Result<(), NeighbourError>;

    /// Keepalive probe; answered on the primary session.
    fn handle_keepalive(&self, peer: &PeerId, nonce: u32) -> Result<(), NeighbourError>;

    /// Answer to our keepalive.
    fn handle_keepalive_response(&self, peer: &PeerId, nonce: u32)
        -> Result<(), NeighbourError>;

    /// The neighbour announces the quota it grants us.
    fn handle_quota(&self, peer: &PeerId, bytes_per_sec: u32) -> Result<(), NeighbourError>;

    /// `size` bytes arrived from `peer`. Says how long the plugin should
    /// wait before reading again and whether to pass the message on.
    fn on_inbound_data(&self, peer: &PeerId, size: usize) -> InboundVerdict;

    /// A plugin session ended. Returns `true` if a neighbour used it.
    fn on_session_terminated(&self, peer: &PeerId, session: SessionId) -> bool;

    /// A plugin finished a send that carried `token`.
    fn on_send_complete(&self, token: SendToken, success: bool, bytes: usize);
}
