//! # Driven Ports (Outbound SPI)
//!
//! Validation uses only the shared ports declared in `shared-types`.

use shared_types::{
    AddressRegistry, AdmissionControl, ClientNotifier, PeerInfoStore, TimeSource,
    TransportPlugins,
};
use std::sync::Arc;

/// Everything address validation talks to.
#[derive(Clone)]
pub struct ValidationPorts {
    /// Wire-level plugins (sessions, sends, own-address checks).
    pub transport: Arc<dyn TransportPlugins>,
    /// Blacklist gate consulted before every PING.
    pub admission: Arc<dyn AdmissionControl>,
    /// Route-selection bridge receiving validated addresses and metrics.
    pub registry: Arc<dyn AddressRegistry>,
    /// Monitoring clients.
    pub notifier: Arc<dyn ClientNotifier>,
    /// Persistent store of validated addresses.
    pub peerinfo: Arc<dyn PeerInfoStore>,
    /// Clock.
    pub time: Arc<dyn TimeSource>,
}
