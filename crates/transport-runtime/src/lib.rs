//! # Transport Runtime
//!
//! Wires the blacklist gate, the ATS bridge, address validation and the
//! neighbour state machine into one [`TransportCore`], routes plugin and
//! client traffic through its dispatcher, and drives it from a tokio loop.
//!
//! ## Architecture
//!
//! ```text
//!  plugins ──bytes/sessions──┐        ┌── route selection (suggestions)
//!                            v        v
//!                      ┌──────────────────┐      ┌────────────┐
//!   CoreHandle ──mpsc──│    CoreDriver    │─────>│ ClientHub  │──> local clients
//!                      │  (tick, select!) │      └────────────┘
//!                      └────────┬─────────┘
//!                               v
//!                      ┌──────────────────┐
//!                      │  TransportCore   │  blacklist · ats · validation · neighbours
//!                      └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let runtime = TransportRuntime::from_config_file("transport.toml", ports)?;
//! let _guard = transport_telemetry::init_telemetry(&runtime.config().telemetry)?;
//! let (handle, task) = runtime.spawn();
//! handle.submit(CoreInput::Connect(peer)).await;
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod clients;
pub mod config;
pub mod container;
pub mod dispatcher;
pub mod driver;
pub mod errors;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use adapters::{SystemTimeSource, ValidationUsageAdapter};
pub use clients::{ClientHandle, ClientHub};
pub use config::{ConfigError, RuntimeConfig};
pub use container::{CoreConfig, ExternalPorts, TransportCore};
pub use dispatcher::TickReport;
pub use driver::{CoreDriver, CoreHandle, CoreInput};
pub use errors::DispatchError;

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use transport_telemetry::{log_event, subsystem};

/// A configured core, ready to be driven.
pub struct TransportRuntime {
    config: RuntimeConfig,
    core: Arc<TransportCore>,
}

impl TransportRuntime {
    /// Load `path`, apply environment overrides and build the core.
    pub fn from_config_file<P: AsRef<Path>>(path: P, ports: ExternalPorts) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = RuntimeConfig::load(path)
            .with_context(|| format!("loading runtime config from {}", path.display()))?
            .with_env_overrides()
            .context("applying environment overrides")?;
        Self::from_config(config, ports)
    }

    /// Build the core from an already loaded configuration.
    pub fn from_config(config: RuntimeConfig, ports: ExternalPorts) -> anyhow::Result<Self> {
        let keypair = config.keypair().context("reading identity seed")?;
        let core_config = CoreConfig::from_runtime(&config).context("building blacklist")?;
        let core = Arc::new(TransportCore::new(core_config, keypair, ports));
        log_event!(
            info,
            subsystem::RUNTIME,
            "Transport runtime configured",
            local = %core.local_peer(),
            max_fds = config.limits.max_fds
        );
        Ok(Self { config, core })
    }

    /// Loaded configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The core, for direct synchronous use.
    pub fn core(&self) -> &Arc<TransportCore> {
        &self.core
    }

    /// Start the driver on the current tokio runtime.
    pub fn spawn(&self) -> (CoreHandle, JoinHandle<()>) {
        CoreDriver::spawn(self.core.clone(), self.config.tick_interval())
    }
}
