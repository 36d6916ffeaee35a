//! # Address Validation Service
//!
//! Thread-safe wrapper around the validation table. Message handlers are in
//! `events`, the host-facing API in `api` and timer work in `maintenance`.
//! All plugin, gate and registry calls are made under the table lock; none
//! of those ports calls back into this service.

mod api;
mod core;
mod events;
mod maintenance;

pub use core::AddressValidationService;

#[cfg(test)]
mod tests;
