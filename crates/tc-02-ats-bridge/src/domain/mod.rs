//! # Domain Layer

pub mod config;
pub mod record;

pub use config::AtsBridgeConfig;
pub use record::{next_back_off, AddressRecord};
