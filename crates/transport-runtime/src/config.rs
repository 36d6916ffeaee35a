//! # Runtime Configuration
//!
//! TOML file, every field defaulted, then overridden from the environment.
//!
//! ## Config File Format
//!
//! ```toml
//! [identity]
//! seed = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//!
//! [limits]
//! max_fds = 1024
//! validation_fast_start_threshold = 64
//!
//! [runtime]
//! tick_interval_ms = 100
//! client_queue_capacity = 256
//!
//! [telemetry]
//! log_level = "debug"
//! json_logs = true
//!
//! [blacklist]
//! # every transport
//! "4a5c...e1" = []
//! # tcp only
//! "77b0...3d" = ["tcp"]
//! ```
//!
//! ## Environment Overrides
//!
//! - `TC_MAX_FDS`: file-descriptor budget
//! - `TC_LOG_LEVEL`: log filter (plus the other `TC_*` telemetry variables)

use serde::Deserialize;
use shared_crypto::PeerKeyPair;
use shared_types::PeerId;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use transport_telemetry::TelemetryConfig;

use tc_01_blacklist::BlacklistConfig;
use tc_03_address_validation::ValidationConfig;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// `[identity] seed` is not 64 hex characters.
    #[error("Invalid identity seed: {0}")]
    InvalidSeed(String),

    /// A `[blacklist]` key is not a peer identity.
    #[error("Invalid blacklisted peer {peer:?}: {reason}")]
    InvalidPeer {
        /// Key as written.
        peer: String,
        /// Parser message.
        reason: String,
    },

    /// An environment override did not parse.
    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Value found.
        value: String,
    },

    /// A value is out of range.
    #[error("Invalid {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Node identity.
    pub identity: IdentityConfig,
    /// Resource limits.
    pub limits: LimitsConfig,
    /// Event loop settings.
    pub runtime: LoopConfig,
    /// Log output.
    pub telemetry: TelemetryConfig,
    /// Static denylist: peer hex → transports. An empty list denies every
    /// transport.
    pub blacklist: BTreeMap<String, Vec<String>>,
}

/// `[identity]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Hex seed of the Ed25519 key. A fresh key is generated when absent.
    pub seed: Option<String>,
}

/// `[limits]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// File-descriptor budget; paces address validation.
    pub max_fds: u32,
    /// In-flight PINGs before pacing starts (default `max_fds / 2`).
    pub validation_fast_start_threshold: Option<u32>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_fds: 1024,
            validation_fast_start_threshold: None,
        }
    }
}

/// `[runtime]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Period of the maintenance tick.
    pub tick_interval_ms: u64,
    /// Events buffered per local client before payloads are dropped.
    pub client_queue_capacity: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            client_queue_capacity: 256,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TC_*` environment variables.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(value) = env::var("TC_MAX_FDS") {
            self.limits.max_fds = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "TC_MAX_FDS",
                value,
            })?;
        }
        self.telemetry = self.telemetry.with_env_overrides();
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_fds == 0 {
            return Err(ConfigError::Invalid {
                field: "limits.max_fds",
                reason: "must be positive",
            });
        }
        if self.runtime.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "runtime.tick_interval_ms",
                reason: "must be positive",
            });
        }
        if self.runtime.client_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "runtime.client_queue_capacity",
                reason: "must be positive",
            });
        }
        Ok(())
    }

    /// Key pair from `[identity] seed`, or a fresh one.
    pub fn keypair(&self) -> Result<PeerKeyPair, ConfigError> {
        match &self.identity.seed {
            Some(seed) => {
                PeerKeyPair::from_hex_seed(seed).map_err(|e| ConfigError::InvalidSeed(e.to_string()))
            }
            None => Ok(PeerKeyPair::generate()),
        }
    }

    /// Static denylist for the blacklist gate.
    pub fn blacklist_config(&self) -> Result<BlacklistConfig, ConfigError> {
        let mut entries = Vec::new();
        for (peer, transports) in &self.blacklist {
            let id = PeerId::from_hex(peer).map_err(|e| ConfigError::InvalidPeer {
                peer: peer.clone(),
                reason: e.to_string(),
            })?;
            if transports.is_empty() {
                entries.push((id, None));
            } else {
                entries.extend(transports.iter().map(|t| (id, Some(t.clone()))));
            }
        }
        Ok(BlacklistConfig { entries })
    }

    /// Validation timing with the configured limits applied.
    pub fn validation_config(&self) -> ValidationConfig {
        ValidationConfig {
            max_fds: self.limits.max_fds,
            fast_start_threshold: self.limits.validation_fast_start_threshold,
            ..ValidationConfig::default()
        }
    }

    /// Period of the maintenance tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.runtime.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER_HEX: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = RuntimeConfig::parse("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.validation_config().fast_start_threshold(), 512);
    }

    #[test]
    fn test_sections_are_parsed() {
        let content = format!(
            r#"
            [identity]
            seed = "{PEER_HEX}"

            [limits]
            max_fds = 64
            validation_fast_start_threshold = 8

            [runtime]
            tick_interval_ms = 20

            [telemetry]
            log_level = "debug"

            [blacklist]
            "{PEER_HEX}" = ["tcp", "udp"]
            "#
        );
        let config = RuntimeConfig::parse(&content).unwrap();
        assert_eq!(config.limits.max_fds, 64);
        assert_eq!(config.runtime.client_queue_capacity, 256);
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.validation_config().fast_start_threshold(), 8);

        let keys = config.keypair().unwrap();
        assert_eq!(keys.to_seed(), [1; 32]);

        let blacklist = config.blacklist_config().unwrap();
        let peer = PeerId::new([1; 32]);
        assert_eq!(
            blacklist.entries,
            vec![
                (peer, Some("tcp".to_string())),
                (peer, Some("udp".to_string()))
            ]
        );
    }

    #[test]
    fn test_empty_transport_list_denies_everything() {
        let content = format!("[blacklist]\n\"{PEER_HEX}\" = []\n");
        let blacklist = RuntimeConfig::parse(&content)
            .unwrap()
            .blacklist_config()
            .unwrap();
        assert_eq!(blacklist.entries, vec![(PeerId::new([1; 32]), None)]);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(matches!(
            RuntimeConfig::parse("[limits]\nmax_fds = 0\n"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            RuntimeConfig::parse("[limits]\nmax_fds = \"many\"\n"),
            Err(ConfigError::Parse(_))
        ));

        let config = RuntimeConfig::parse("[blacklist]\nnot-hex = []\n").unwrap();
        assert!(matches!(
            config.blacklist_config(),
            Err(ConfigError::InvalidPeer { .. })
        ));

        let config = RuntimeConfig::parse("[identity]\nseed = \"abc\"\n").unwrap();
        assert!(matches!(config.keypair(), Err(ConfigError::InvalidSeed(_))));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transport.toml");
        std::fs::write(&path, "[runtime]\ntick_interval_ms = 5\n").unwrap();
        assert_eq!(
            RuntimeConfig::load(&path).unwrap().tick_interval(),
            Duration::from_millis(5)
        );
        assert!(matches!(
            RuntimeConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
