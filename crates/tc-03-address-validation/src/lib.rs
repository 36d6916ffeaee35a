//! # Address Validation
//!
//! **Subsystem ID:** 3
//!
//! Proves that an address is live and owned by the peer claiming it. For
//! every (peer, address) pair we learn about, a validation entry sends an
//! authenticated PING; the peer answers with a PONG signed by its identity
//! key over the confirmed address and an expiration.
//!
//! ## Lifecycle of an entry
//!
//! 1. Created from a HELLO, a peer-information record or an inbound PING.
//! 2. Revalidated on a schedule: every 2 min while the address is in use
//!    by a neighbour, every 15 min while valid, every 30 min otherwise,
//!    each plus a random jitter of up to the same amount.
//! 3. A good PONG extends `valid_until` (never shortens it), records the
//!    latency and registers the address with the route-selection bridge.
//! 4. Garbage-collected once validity and revalidation block both ran out.
//!
//! ## Throughput
//!
//! Up to `max_fds / 2` PINGs may be in flight at once without pacing;
//! beyond that a global inter-PING delay of `IDLE_CONNECTION_TIMEOUT /
//! max_fds` applies.
//!
//! ## Own addresses
//!
//! We answer a PING naming an address only when the owning plugin confirms
//! the address is ours. PONG signatures are cached per address and only
//! re-signed when less than a quarter of their lifetime remains, so two
//! PINGs in quick succession get byte-identical signatures.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    EntrySnapshot, OwnAddresses, PingBudget, PongRejectReason, PongSignature,
    RevalidationTier, SignatureCache, ValidationConfig, ValidationEntry, ValidationError,
};
pub use ports::{AddressValidationApi, ValidationMessageHandler, ValidationPorts};
pub use service::AddressValidationService;
