//! Global subscriber installation.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Returned by [`init_telemetry`]; logs shutdown when dropped.
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Build the filter for a config.
pub(crate) fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::Filter {
        filter: config.log_level.clone(),
        reason: e.to_string(),
    })
}

/// Install the global `tracing` subscriber.
///
/// Fails if a subscriber is already installed (e.g. a second runtime in
/// the same process); callers that may race should ignore that error.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let env_filter = build_filter(config)?;

    if config.json_logs {
        // JSON output for containers/production
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.with_location)
            .with_line_number(config.with_location);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::Install(e.to_string()))?;
    } else {
        // Compact output for development
        let fmt_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_file(config.with_location)
            .with_line_number(config.with_location);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::Install(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        json = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}
