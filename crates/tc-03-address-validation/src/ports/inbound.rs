//! # Driving Ports (Inbound API)

use shared_types::{
    Address, HelloMessage, PeerId, PingMessage, PongMessage, SessionId, Timestamp,
};
use std::time::Duration;

use crate::domain::{EntrySnapshot, ValidationError};

/// Host- and neighbour-facing API of address validation.
pub trait AddressValidationApi {
    /// Learn an address from the peer-information store, valid until
    /// `expiration`. Returns `false` for expired or own-peer addresses.
    fn handle_address(&self, address: &Address, expiration: Timestamp) -> bool;

    /// A neighbour started or stopped using `address`.
    ///
    /// Switching to in-use moves the entry to the connected revalidation
    /// tier and schedules a revalidation right away (subject to the
    /// revalidation block).
    fn set_address_use(&self, address: &Address, in_use: bool);

    /// Round-trip time measured by the last successful PING.
    fn get_latency(&self, address: &Address) -> Option<Duration>;

    /// Register one of our own addresses. Returns `false` if already known.
    fn add_own_address(&self, transport: &str, raw: &[u8]) -> bool;

    /// Withdraw one of our own addresses. Returns `false` if unknown.
    fn remove_own_address(&self, transport: &str, raw: &[u8]) -> bool;

    /// HELLO advertising our own addresses.
    fn own_hello(&self) -> HelloMessage;

    /// Snapshot of every entry.
    fn entries(&self) -> Vec<EntrySnapshot>;

    /// Snapshot of the entry for `address`.
    fn entry(&self, address: &Address) -> Option<EntrySnapshot>;
}

/// Handlers for validation messages received from the network.
///
/// Every error is a protocol-level reject: the host logs it and drops the
/// message.
pub trait ValidationMessageHandler {
    /// A peer advertised its addresses. Returns how many entries were
    /// created or refreshed.
    fn handle_hello(&self, hello: &HelloMessage) -> usize;

    /// A peer probes one of our addresses (or, without an address, the
    /// session the PING arrived on). Answers with a signed PONG.
    fn handle_ping(
        &self,
        sender: &PeerId,
        ping: &PingMessage,
        sender_address: &Address,
        session: Option<SessionId>,
    ) -> Result<(), ValidationError>;

    /// A peer answered one of our PINGs.
    fn handle_pong(&self, sender: &PeerId, pong: &PongMessage) -> Result<(), ValidationError>;
}
