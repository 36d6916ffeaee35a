//! # Core Entities
//!
//! Peer identities, addresses, sessions, bandwidth and time.

use std::fmt;
use std::time::Duration;

use crate::errors::ParseError;

// =============================================================================
// PEER IDENTITY
// =============================================================================

/// 256-bit peer identifier.
///
/// A peer is identified by its Ed25519 public key, so the identifier doubles
/// as the key used to verify PONG and DISCONNECT signatures from that peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    /// Create a PeerId from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw public key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a PeerId from 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        let bytes = hex::decode(s.trim()).map_err(|_| ParseError::InvalidHex)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ParseError::InvalidLength {
                expected: 32,
                actual: v.len(),
            })?;
        Ok(Self(bytes))
    }

    /// Full hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PeerId {
    /// Short form: first four bytes, enough to tell peers apart in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..4]))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", hex::encode(&self.0[..4]))
    }
}

// =============================================================================
// SESSIONS
// =============================================================================

/// Opaque handle a transport plugin returns when it opens or accepts a
/// connection over an address.
///
/// The core never dereferences a session; it only hands the token back to
/// the plugin, which may answer that the session is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a plugin-assigned session number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Plugin-assigned session number.
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Correlates an asynchronous plugin send completion with the send that
/// caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendToken(pub u64);

// =============================================================================
// ADDRESSES
// =============================================================================

/// Where a peer might be reached: a transport name plus plugin-specific
/// bytes.
///
/// `inbound` marks addresses learned from a connection the remote side
/// opened; those cannot be dialled and are never advertised.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Peer the address belongs to.
    pub peer: PeerId,
    /// Name of the transport plugin (e.g. "tcp").
    pub transport: String,
    /// Plugin-specific address bytes.
    pub raw: Vec<u8>,
    /// Learned from an inbound connection.
    pub inbound: bool,
}

impl Address {
    /// Create an outbound address.
    pub fn new(peer: PeerId, transport: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            peer,
            transport: transport.into(),
            raw: raw.into(),
            inbound: false,
        }
    }

    /// Create an address learned from an inbound connection.
    pub fn inbound(peer: PeerId, transport: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            inbound: true,
            ..Self::new(peer, transport, raw)
        }
    }

    /// True when transport and raw bytes match, regardless of direction.
    pub fn same_endpoint(&self, other: &Address) -> bool {
        self.peer == other.peer && self.transport == other.transport && self.raw == other.raw
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.raw) {
            Ok(text) if !text.is_empty() => write!(f, "{}:{}", self.transport, text),
            _ => write!(f, "{}:0x{}", self.transport, hex::encode(&self.raw)),
        }?;
        if self.inbound {
            write!(f, " (inbound)")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({} @ {})", self.peer, self)
    }
}

/// Numeric network-type classification of an address or session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetworkType {
    /// Not yet classified.
    #[default]
    Unspecified,
    /// Loopback.
    Loopback,
    /// Local area network.
    Lan,
    /// Wide area network.
    Wan,
    /// Wireless LAN.
    Wlan,
    /// Bluetooth.
    Bluetooth,
}

impl NetworkType {
    /// Wire/ATS code.
    pub fn code(self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::Loopback => 1,
            Self::Lan => 2,
            Self::Wan => 3,
            Self::Wlan => 4,
            Self::Bluetooth => 5,
        }
    }

    /// Decode a wire/ATS code; unknown values map to `Unspecified`.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Loopback,
            2 => Self::Lan,
            3 => Self::Wan,
            4 => Self::Wlan,
            5 => Self::Bluetooth,
            _ => Self::Unspecified,
        }
    }
}

/// Metrics reported to the route-selection service for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressProperties {
    /// Observed one-way delay.
    pub delay: Duration,
    /// Distance in hops (0 for direct).
    pub distance: u32,
    /// Network classification.
    pub network: NetworkType,
    /// Inbound utilization in bytes/s.
    pub utilization_in: u32,
    /// Outbound utilization in bytes/s.
    pub utilization_out: u32,
}

// =============================================================================
// BANDWIDTH
// =============================================================================

/// Bandwidth in bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Bandwidth(u32);

impl Bandwidth {
    /// No bandwidth at all.
    pub const ZERO: Bandwidth = Bandwidth(0);

    /// Smallest quota a neighbour can impose on us.
    pub const MIN: Bandwidth = Bandwidth(1024);

    /// Create from bytes per second.
    pub const fn new(bytes_per_sec: u32) -> Self {
        Self(bytes_per_sec)
    }

    /// Bytes per second.
    pub const fn bytes_per_sec(&self) -> u32 {
        self.0
    }

    /// True for a zero allocation.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} B/s", self.0)
    }
}

// =============================================================================
// TIME
// =============================================================================

/// Millisecond timestamp.
///
/// Zero is reserved to mean "never" (e.g. an address that was never
/// validated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// "Never".
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the clock's epoch.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// True for the "never" sentinel.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `self + d`, saturating.
    pub fn saturating_add(self, d: Duration) -> Self {
        let millis = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }

    /// Time elapsed from `earlier` to `self` (zero if `earlier` is later).
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// Time left until `self` as seen from `now` (zero if already passed).
    pub fn remaining(self, now: Timestamp) -> Duration {
        self.saturating_duration_since(now)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
