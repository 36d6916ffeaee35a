//! Blacklist errors.

use thiserror::Error;

use super::gate::ClientId;
use shared_types::CheckId;

/// Errors reported to policy clients and the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlacklistError {
    /// A client id was registered twice.
    #[error("Policy client {0:?} already registered")]
    DuplicateClient(ClientId),

    /// Reply or removal from a client that is not registered.
    #[error("Unknown policy client {0:?}")]
    UnknownClient(ClientId),

    /// The client answered a check it was not asked about. Late replies to
    /// cancelled checks end up here and are harmless.
    #[error("Policy client {client:?} replied to {check:?} without a query in flight")]
    UnexpectedReply { client: ClientId, check: CheckId },
}
