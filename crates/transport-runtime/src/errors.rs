//! Runtime error types.

use shared_types::WireError;
use tc_01_blacklist::BlacklistError;
use tc_03_address_validation::ValidationError;
use tc_04_neighbours::NeighbourError;
use thiserror::Error;

/// Why an inbound message was dropped.
///
/// Never fatal: the dispatcher logs it and moves on.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Bytes did not decode.
    #[error("Undecodable message: {0}")]
    Wire(#[from] WireError),

    /// Address validation rejected the message.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The neighbour state machine rejected the message.
    #[error(transparent)]
    Neighbour(#[from] NeighbourError),

    /// The blacklist gate rejected a policy-client message.
    #[error(transparent)]
    Blacklist(#[from] BlacklistError),
}
