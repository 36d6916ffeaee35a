//! # Neighbour Service
//!
//! Thread-safe wrapper around the neighbour table. The client API is in
//! `api`, message and plugin callbacks in `events`, deadlines and periodic
//! work in `maintenance`. Ports are called under the table lock; none of
//! them calls back into this service.

mod api;
mod core;
mod events;
mod maintenance;

pub use core::NeighbourService;
