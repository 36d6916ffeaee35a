//! # Client Events
//!
//! Records broadcast to local applications through the
//! [`ClientNotifier`](crate::ports::ClientNotifier) port, plus the plain
//! state enums they carry.

use crate::entities::{Address, Bandwidth, PeerId, Timestamp};

/// Observable neighbour connection state.
///
/// The neighbour state machine keeps a richer tagged union internally; this
/// is the flat view exported to monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Fresh entry, nothing happened yet.
    NotConnected,
    /// Asked the route-selection service for an address.
    InitAts,
    /// Sent SYN, waiting for SYN_ACK.
    SynSent,
    /// Received SYN, waiting for an address to answer on.
    SynRecvAts,
    /// Sent SYN_ACK, waiting for ACK.
    SynRecvAck,
    /// Handshake complete.
    Connected,
    /// Primary address died, waiting for a replacement.
    ReconnectAts,
    /// Sent SYN on the replacement, waiting for SYN_ACK.
    ReconnectSent,
    /// Connected, probing an alternative address with SYN.
    SwitchSynSent,
    /// DISCONNECT sent, waiting for it to flush.
    Disconnect,
    /// Terminal state; the entry is about to be freed.
    DisconnectFinished,
}

impl ConnectionState {
    /// True while a handshake has completed and the peer may be used.
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            Self::Connected | Self::ReconnectAts | Self::ReconnectSent | Self::SwitchSynSent
        )
    }

    /// True once teardown has started.
    pub fn is_disconnecting(self) -> bool {
        matches!(self, Self::Disconnect | Self::DisconnectFinished)
    }
}

/// Monitoring view of a validation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationState {
    /// Entry was just created.
    New,
    /// Network type (cost) changed.
    CostUpdated,
    /// Latency (quality) changed.
    QualityUpdated,
    /// Both changed.
    QualityCostUpdated,
    /// Revalidated, nothing changed.
    Unmodified,
}

/// Event delivered to local clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Handshake with a peer completed.
    Connected { peer: PeerId, bandwidth_out: Bandwidth },
    /// Peer is no longer connected.
    Disconnected { peer: PeerId },
    /// Neighbour changed state or address.
    NeighbourChanged {
        peer: PeerId,
        address: Option<Address>,
        state: ConnectionState,
        state_timeout: Timestamp,
    },
    /// Advisory outbound quota; enforcement is up to the client.
    QuotaAdvisory { peer: PeerId, bandwidth_out: Bandwidth },
    /// A queued payload left (or failed to leave) the node.
    SendComplete {
        peer: PeerId,
        receipt: u64,
        success: bool,
        bytes: usize,
    },
    /// Payload received from a connected peer.
    Received { peer: PeerId, payload: Vec<u8> },
    /// Validation entry changed.
    ValidationChanged {
        address: Address,
        state: ValidationState,
        last_validation: Timestamp,
        valid_until: Timestamp,
        next_validation: Timestamp,
    },
    /// Validation entry was garbage-collected.
    ValidationRemoved { address: Address },
}

impl ClientEvent {
    /// Control events are never dropped on queue overflow; payloads are.
    pub fn is_control(&self) -> bool {
        !matches!(self, Self::Received { .. })
    }
}
