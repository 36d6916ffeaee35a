//! # Driven Ports (Outbound SPI)

use shared_types::{
    Address, AddressRegistry, AdmissionControl, ClientNotifier, TimeSource, TransportPlugins,
};
use std::sync::Arc;

/// Tells address validation which addresses neighbours are using.
///
/// Implemented by the host on top of the validation service so the two
/// subsystems never depend on each other directly.
pub trait AddressUsage: Send + Sync {
    /// A neighbour started or stopped using `address`.
    fn set_address_use(&self, address: &Address, in_use: bool);
}

/// Everything the neighbour state machine talks to.
#[derive(Clone)]
pub struct NeighbourPorts {
    /// Wire-level plugins.
    pub transport: Arc<dyn TransportPlugins>,
    /// Blacklist gate.
    pub admission: Arc<dyn AdmissionControl>,
    /// Route-selection bridge (suggestions, sessions, blocks, metrics).
    pub registry: Arc<dyn AddressRegistry>,
    /// Local clients.
    pub notifier: Arc<dyn ClientNotifier>,
    /// Address validation.
    pub usage: Arc<dyn AddressUsage>,
    /// Clock.
    pub time: Arc<dyn TimeSource>,
}
