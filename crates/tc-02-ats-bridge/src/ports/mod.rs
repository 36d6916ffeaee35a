//! # Ports Layer
//!
//! - **Driving Port:** the shared
//!   [`AddressRegistry`](shared_types::AddressRegistry), implemented by
//!   [`AtsBridge`](crate::AtsBridge)
//! - **Driven Port:** [`RouteSelectionService`]

pub mod outbound;

pub use outbound::RouteSelectionService;
