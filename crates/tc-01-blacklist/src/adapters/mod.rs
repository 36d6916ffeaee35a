//! # Adapters
//!
//! Recording implementations of the outbound ports.

pub mod mocks;

pub use mocks::RecordingPolicyChannel;
