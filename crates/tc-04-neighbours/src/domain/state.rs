//! Tagged-union neighbour state.

use shared_types::ConnectionState;

use super::slot::AddressSlot;

/// Neighbour state carrying exactly the address slots valid in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NeighbourState {
    /// Fresh entry.
    NotConnected,
    /// Waiting for an address suggestion.
    InitAts,
    /// SYN sent on `primary`.
    SynSent { primary: AddressSlot },
    /// SYN received; waiting for an address to answer on.
    SynRecvAts,
    /// SYN_ACK sent on `primary`; waiting for ACK.
    SynRecvAck { primary: AddressSlot },
    /// Handshake complete.
    Connected { primary: AddressSlot },
    /// Primary died; waiting for a replacement address.
    ReconnectAts,
    /// SYN sent on the replacement.
    ReconnectSent { primary: AddressSlot },
    /// Connected on `primary`, probing `alternative` with SYN.
    SwitchSynSent {
        primary: AddressSlot,
        alternative: AddressSlot,
    },
    /// DISCONNECT sent on `primary` (if any); flushing.
    Disconnect { primary: Option<AddressSlot> },
    /// Terminal.
    DisconnectFinished,
}

impl NeighbourState {
    /// Flat view exported to monitors.
    pub fn kind(&self) -> ConnectionState {
        match self {
            Self::NotConnected => ConnectionState::NotConnected,
            Self::InitAts => ConnectionState::InitAts,
            Self::SynSent { .. } => ConnectionState::SynSent,
            Self::SynRecvAts => ConnectionState::SynRecvAts,
            Self::SynRecvAck { .. } => ConnectionState::SynRecvAck,
            Self::Connected { .. } => ConnectionState::Connected,
            Self::ReconnectAts => ConnectionState::ReconnectAts,
            Self::ReconnectSent { .. } => ConnectionState::ReconnectSent,
            Self::SwitchSynSent { .. } => ConnectionState::SwitchSynSent,
            Self::Disconnect { .. } => ConnectionState::Disconnect,
            Self::DisconnectFinished => ConnectionState::DisconnectFinished,
        }
    }

    /// Primary slot, if the state has one.
    pub fn primary(&self) -> Option<&AddressSlot> {
        match self {
            Self::SynSent { primary }
            | Self::SynRecvAck { primary }
            | Self::Connected { primary }
            | Self::ReconnectSent { primary }
            | Self::SwitchSynSent { primary, .. } => Some(primary),
            Self::Disconnect { primary } => primary.as_ref(),
            _ => None,
        }
    }

    /// Mutable primary slot.
    pub fn primary_mut(&mut self) -> Option<&mut AddressSlot> {
        match self {
            Self::SynSent { primary }
            | Self::SynRecvAck { primary }
            | Self::Connected { primary }
            | Self::ReconnectSent { primary }
            | Self::SwitchSynSent { primary, .. } => Some(primary),
            Self::Disconnect { primary } => primary.as_mut(),
            _ => None,
        }
    }

    /// Alternative slot (only while switching).
    pub fn alternative(&self) -> Option<&AddressSlot> {
        match self {
            Self::SwitchSynSent { alternative, .. } => Some(alternative),
            _ => None,
        }
    }

    /// Move the slots out, leaving `NotConnected` behind.
    pub fn take_slots(&mut self) -> (Option<AddressSlot>, Option<AddressSlot>) {
        match std::mem::replace(self, Self::NotConnected) {
            Self::SynSent { primary }
            | Self::SynRecvAck { primary }
            | Self::Connected { primary }
            | Self::ReconnectSent { primary } => (Some(primary), None),
            Self::SwitchSynSent {
                primary,
                alternative,
            } => (Some(primary), Some(alternative)),
            Self::Disconnect { primary } => (primary, None),
            _ => (None, None),
        }
    }

    /// A handshake completed and the peer may be used.
    pub fn is_connected(&self) -> bool {
        self.kind().is_connected()
    }
}
