//! # Domain Layer
//!
//! Validation entries, the own-address registry with its signature cache,
//! and the PING pacing budget. No I/O.

pub mod config;
pub mod entry;
pub mod errors;
pub mod own_addresses;
pub mod pacing;

pub use config::ValidationConfig;
pub use entry::{EntrySnapshot, RevalidationTier, ValidationEntry};
pub use errors::{PongRejectReason, ValidationError};
pub use own_addresses::{OwnAddresses, PongSignature, SignatureCache};
pub use pacing::PingBudget;
