//! Validation errors.
//!
//! All of these are protocol-level rejects: the message is logged and
//! dropped and no entry changes state.

use shared_types::TransportError;
use thiserror::Error;

/// Why a PONG was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PongRejectReason {
    /// No entry for the (peer, address) named in the PONG.
    UnknownAddress,
    /// No PING outstanding on the entry.
    NotExpected,
    /// Challenge differs from the outstanding PING's.
    ChallengeMismatch,
    /// Signature lifetime already over.
    Expired,
    /// Purpose header wrong or signature does not verify.
    BadSignature,
}

/// Errors returned by validation message handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// PING addressed to another peer.
    #[error("PING target is not this peer")]
    NotForUs,

    /// PING names an address our plugin does not recognise as ours.
    #[error("Address {0} is not ours")]
    AddressNotOwned(String),

    /// Session-only PING arrived without a session to answer on.
    #[error("No session to answer on")]
    NoSession,

    /// PONG could not be sent over any session.
    #[error("PONG could not be delivered: {0}")]
    Undeliverable(TransportError),

    /// PONG rejected.
    #[error("PONG rejected: {0:?}")]
    PongRejected(PongRejectReason),
}
