//! Neighbour errors.

use shared_types::{ConnectionState, TransportError};
use thiserror::Error;

/// Why a DISCONNECT message was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectRejectReason {
    /// Public key in the message is not the sender's.
    KeyMismatch,
    /// Purpose header wrong or signature does not verify.
    BadSignature,
    /// Timestamp not newer than the handshake it would end.
    Stale,
}

/// Errors returned by the neighbour API and message handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NeighbourError {
    /// Tried to connect to ourselves.
    #[error("Cannot connect to the local peer")]
    SelfConnect,

    /// No entry for the peer.
    #[error("Unknown neighbour")]
    UnknownPeer,

    /// The neighbour has not completed a handshake.
    #[error("Neighbour is not connected")]
    NotConnected,

    /// Payload shorter than a message header.
    #[error("Malformed payload of {0} bytes")]
    Malformed(usize),

    /// The message does not fit the current state.
    #[error("Unexpected {message} in state {state:?}")]
    UnexpectedMessage {
        message: &'static str,
        state: ConnectionState,
    },

    /// SYN_ACK not matching the SYN we sent.
    #[error("SYN_ACK does not match our SYN")]
    StaleSynAck,

    /// DISCONNECT rejected.
    #[error("DISCONNECT rejected: {0:?}")]
    BadDisconnect(DisconnectRejectReason),

    /// A plugin refused a send.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),
}
