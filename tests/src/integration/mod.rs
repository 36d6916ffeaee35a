//! # Integration Scenarios
//!
//! Every scenario builds a [`network::Network`] of complete cores and
//! drives it by hand: events are delivered in order and the clock only
//! moves when a test advances it.

pub mod network;

mod blacklist;
mod driver;
mod handshake;
mod switching;
mod validation;
