//! # Domain Layer
//!
//! Neighbour entries, their tagged-union states, address slots, the
//! inbound bandwidth tracker and the outbound message queue. No I/O.

pub mod bandwidth;
pub mod config;
pub mod entry;
pub mod errors;
pub mod queue;
pub mod slot;
pub mod state;

pub use bandwidth::BandwidthTracker;
pub use config::NeighbourConfig;
pub use entry::{AckState, InboundVerdict, NeighbourEntry, NeighbourInfo};
pub use errors::{DisconnectRejectReason, NeighbourError};
pub use queue::{InFlight, MessageQueue, QueuedMessage};
pub use slot::AddressSlot;
pub use state::NeighbourState;
