//! # Error Types
//!
//! Errors shared across subsystems: wire decoding, plugin failures and
//! identifier parsing.

use thiserror::Error;

/// Errors decoding a wire message.
///
/// Every variant is a protocol-level reject: the offending message is
/// logged and dropped, it never affects connection state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Fewer bytes than the header or declared size require.
    #[error("Truncated message: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Declared size is impossible for the message type.
    #[error("Bad size {size} for message type {msg_type}")]
    BadSize { msg_type: u16, size: usize },

    /// Transport name is not zero-terminated UTF-8.
    #[error("Malformed transport address")]
    MalformedAddress,

    /// Message does not fit the 16-bit size field.
    #[error("Message too large: {size} bytes")]
    TooLarge { size: usize },
}

/// Errors reported by transport plugins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The session token no longer refers to a live session.
    #[error("Session is gone")]
    SessionGone,

    /// No plugin is loaded for the transport name.
    #[error("No plugin for transport {0}")]
    UnknownTransport(String),

    /// The plugin could not queue the message.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The plugin could not open a session for the address.
    #[error("Could not create session")]
    NoSession,
}

/// Errors parsing identifiers from text (configuration, CLI).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Not valid hexadecimal.
    #[error("Invalid hex encoding")]
    InvalidHex,

    /// Wrong number of bytes.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
