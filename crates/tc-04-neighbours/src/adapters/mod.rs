//! Recording adapters for tests.

pub mod mocks;

pub use mocks::RecordingAddressUsage;
