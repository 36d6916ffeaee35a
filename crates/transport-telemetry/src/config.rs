//! Telemetry configuration from environment variables or the runtime
//! config file.

use std::env;

use serde::Deserialize;

/// Configuration for log output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name logged at startup
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error, or full
    /// `EnvFilter` directives)
    pub log_level: String,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Include file and line in log records
    pub with_location: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "peer-transport".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            with_location: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// - `TC_SERVICE_NAME`: Service name (default: peer-transport)
    /// - `TC_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `TC_LOG_JSON`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment variables on top of an existing configuration.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(name) = env::var("TC_SERVICE_NAME") {
            self.service_name = name;
        }
        if let Ok(level) = env::var("TC_LOG_LEVEL").or_else(|_| env::var("RUST_LOG")) {
            self.log_level = level;
        }
        if let Ok(v) = env::var("TC_LOG_JSON") {
            self.json_logs = v.eq_ignore_ascii_case("true") || v == "1";
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "peer-transport");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }
}
