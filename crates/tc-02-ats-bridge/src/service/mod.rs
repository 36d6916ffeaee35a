//! # Bridge Service
//!
//! [`AtsBridge`] implements the shared
//! [`AddressRegistry`](shared_types::AddressRegistry) port on top of a
//! [`RouteSelectionService`](crate::RouteSelectionService).

mod api;
mod core;
mod maintenance;

pub use core::AtsBridge;

#[cfg(test)]
mod tests;
