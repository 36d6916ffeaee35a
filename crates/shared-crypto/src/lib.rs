//! # Shared Crypto - Peer Identity and Signatures
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Peer identity, PONG and DISCONNECT signing |
//! | `purpose` | - | `(size, purpose)` prefix of every signed payload |
//!
//! A peer's identifier is its Ed25519 public key, so any signature a peer
//! sends can be checked without a key lookup.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod purpose;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use purpose::{purpose_bytes, SignaturePurpose, PURPOSE_HEADER_SIZE};
pub use signatures::{PeerKeyPair, PeerPublicKey, PeerSignature};
