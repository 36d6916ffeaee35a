//! # Core Container
//!
//! Builds the four subsystems and wires them together.
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: Blacklist gate, ATS bridge, client hub (external ports only)
//! Level 1: Address validation (gate, bridge, hub)
//! Level 2: Neighbours (gate, bridge, hub, validation)
//! ```
//!
//! ## Thread Safety
//!
//! Every service is shared through `Arc` and guards its own state with a
//! `parking_lot::Mutex`. Services never call each other synchronously in a
//! cycle: results that arrive later (verdicts, send completions, session
//! changes) are fed in by the dispatcher.

use shared_crypto::PeerKeyPair;
use shared_types::{PeerId, PeerInfoStore, TimeSource, TransportPlugins};
use std::sync::Arc;
use transport_telemetry::{log_event, subsystem};

use tc_01_blacklist::{BlacklistConfig, BlacklistService, PolicyClientChannel};
use tc_02_ats_bridge::{AtsBridge, AtsBridgeConfig, RouteSelectionService};
use tc_03_address_validation::{AddressValidationService, ValidationConfig, ValidationPorts};
use tc_04_neighbours::{NeighbourConfig, NeighbourPorts, NeighbourService};

use crate::adapters::ValidationUsageAdapter;
use crate::clients::ClientHub;
use crate::config::{ConfigError, RuntimeConfig};

/// Collaborators outside the core.
#[derive(Clone)]
pub struct ExternalPorts {
    /// Wire-level transport plugins.
    pub transport: Arc<dyn TransportPlugins>,
    /// Route-selection service.
    pub route: Arc<dyn RouteSelectionService>,
    /// Connected policy clients.
    pub policy: Arc<dyn PolicyClientChannel>,
    /// Persistent peer-information store.
    pub peerinfo: Arc<dyn PeerInfoStore>,
    /// Clock.
    pub time: Arc<dyn TimeSource>,
}

/// Configuration of every subsystem.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Static denylist.
    pub blacklist: BlacklistConfig,
    /// Address back-off limits.
    pub ats: AtsBridgeConfig,
    /// Validation timing.
    pub validation: ValidationConfig,
    /// Neighbour timing.
    pub neighbours: NeighbourConfig,
    /// Events buffered per local client.
    pub client_queue_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            blacklist: BlacklistConfig::default(),
            ats: AtsBridgeConfig::default(),
            validation: ValidationConfig::default(),
            neighbours: NeighbourConfig::default(),
            client_queue_capacity: 256,
        }
    }
}

impl CoreConfig {
    /// Subsystem configuration from the runtime file.
    pub fn from_runtime(config: &RuntimeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            blacklist: config.blacklist_config()?,
            validation: config.validation_config(),
            client_queue_capacity: config.runtime.client_queue_capacity,
            ..Self::default()
        })
    }
}

/// The transport core: all subsystems plus the dispatcher state.
pub struct TransportCore {
    pub(crate) local: PeerId,
    pub(crate) blacklist: Arc<BlacklistService>,
    pub(crate) ats: Arc<AtsBridge>,
    pub(crate) validation: Arc<AddressValidationService>,
    pub(crate) neighbours: Arc<NeighbourService>,
    pub(crate) clients: Arc<ClientHub>,
    pub(crate) transport: Arc<dyn TransportPlugins>,
}

impl TransportCore {
    /// Build and wire every subsystem for the peer owning `keypair`.
    pub fn new(config: CoreConfig, keypair: PeerKeyPair, ports: ExternalPorts) -> Self {
        let local = keypair.peer_id();

        // Level 0
        let blacklist = Arc::new(BlacklistService::new(&config.blacklist, ports.policy));
        let ats = Arc::new(AtsBridge::new(config.ats, ports.route, ports.time.clone()));
        let clients = Arc::new(ClientHub::new(config.client_queue_capacity));

        // Level 1
        let validation = Arc::new(AddressValidationService::new(
            config.validation,
            PeerKeyPair::from_seed(keypair.to_seed()),
            ValidationPorts {
                transport: ports.transport.clone(),
                admission: blacklist.clone(),
                registry: ats.clone(),
                notifier: clients.clone(),
                peerinfo: ports.peerinfo,
                time: ports.time.clone(),
            },
        ));

        // Level 2
        let neighbours = Arc::new(NeighbourService::new(
            config.neighbours,
            keypair,
            NeighbourPorts {
                transport: ports.transport.clone(),
                admission: blacklist.clone(),
                registry: ats.clone(),
                notifier: clients.clone(),
                usage: Arc::new(ValidationUsageAdapter::new(validation.clone())),
                time: ports.time,
            },
        ));

        log_event!(info, subsystem::RUNTIME, "Transport core created", local = %local);
        Self {
            local,
            blacklist,
            ats,
            validation,
            neighbours,
            clients,
            transport: ports.transport,
        }
    }

    /// Our peer identity.
    pub fn local_peer(&self) -> PeerId {
        self.local
    }

    /// Blacklist gate.
    pub fn blacklist(&self) -> &Arc<BlacklistService> {
        &self.blacklist
    }

    /// Route-selection bridge.
    pub fn ats(&self) -> &Arc<AtsBridge> {
        &self.ats
    }

    /// Address validation.
    pub fn validation(&self) -> &Arc<AddressValidationService> {
        &self.validation
    }

    /// Neighbour state machine.
    pub fn neighbours(&self) -> &Arc<NeighbourService> {
        &self.neighbours
    }

    /// Local client queues.
    pub fn clients(&self) -> &Arc<ClientHub> {
        &self.clients
    }
}
