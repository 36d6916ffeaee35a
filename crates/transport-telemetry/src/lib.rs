//! # Transport Telemetry
//!
//! Structured logging for the peer transport core.
//!
//! Every subsystem logs through `tracing`; this crate installs the global
//! subscriber once, at the process edge.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use transport_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TC_SERVICE_NAME` | `peer-transport` | Service name stamped on startup |
//! | `TC_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `TC_LOG_JSON` | `false` | JSON formatted logs |

#![warn(missing_docs)]

mod config;
mod logging;
mod subscriber;

pub use config::TelemetryConfig;
pub use subscriber::{init_telemetry, TelemetryGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The log filter directive did not parse.
    #[error("Invalid log filter {filter:?}: {reason}")]
    Filter {
        /// Directive as configured
        filter: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Failed to install subscriber: {0}")]
    Install(String),
}

/// Subsystem names used as the `subsystem` log field.
pub mod subsystem {
    /// Blacklist gate.
    pub const BLACKLIST: &str = "blacklist";
    /// Route-selection bridge.
    pub const ATS: &str = "ats";
    /// Address validation.
    pub const VALIDATION: &str = "validation";
    /// Neighbour state machine.
    pub const NEIGHBOURS: &str = "neighbours";
    /// Runtime and dispatcher.
    pub const RUNTIME: &str = "runtime";
}
