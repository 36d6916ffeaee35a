//! # Adapters
//!
//! Recording implementation of [`RouteSelectionService`](crate::RouteSelectionService).

pub mod mocks;

pub use mocks::{RecordingRouteSelection, RouteCall};
