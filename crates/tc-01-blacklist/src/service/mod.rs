//! # Blacklist Service
//!
//! Thread-safe wrapper around the denylist and the round-robin gate.
//! Queries go out through [`PolicyClientChannel`](crate::PolicyClientChannel);
//! verdicts are queued for the host to drain and route to whichever
//! subsystem started the check.

mod api;
mod core;

pub use core::BlacklistService;
