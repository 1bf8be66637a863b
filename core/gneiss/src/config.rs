// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Daemon configuration: logging, runtime, and the two gRPC endpoints. The
// gNMI endpoint faces controllers; the PhalDB endpoint stays on a local
// address for on-switch tooling and is served in the clear by default.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use gneiss_config::grpc::server::ServerConfig;

use crate::runtime::RuntimeConfig;

/// Default gNMI listening address.
pub const DEFAULT_GNMI_URL: &str = "0.0.0.0:9339";

/// Default local PhalDB listening address.
pub const DEFAULT_PHALDB_URL: &str = "127.0.0.1:28000";

/// Logging section of the daemon configuration. `level` applies across the
/// daemon; a `RUST_LOG` environment variable, when set, wins over the file
/// so operators can cut per-target directives without touching the config.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Include runtime worker thread names in log lines.
    #[serde(default)]
    pub thread_names: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            thread_names: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LogConfig {
    /// The configured level; anything unparseable falls back to INFO.
    pub fn level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().to_string()))
    }

    /// Install the process-wide subscriber. Called once at startup.
    pub fn init(&self) {
        tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_thread_names(self.thread_names)
            .init();
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GneissConfig {
    #[serde(default)]
    pub logging: LogConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default = "default_gnmi_server")]
    pub gnmi: ServerConfig,

    #[serde(default = "default_phaldb_server")]
    pub phaldb: ServerConfig,
}

impl Default for GneissConfig {
    fn default() -> Self {
        Self {
            logging: LogConfig::default(),
            runtime: RuntimeConfig::default(),
            gnmi: default_gnmi_server(),
            phaldb: default_phaldb_server(),
        }
    }
}

fn default_gnmi_server() -> ServerConfig {
    ServerConfig::with_endpoint(DEFAULT_GNMI_URL)
}

fn default_phaldb_server() -> ServerConfig {
    ServerConfig::with_endpoint(DEFAULT_PHALDB_URL)
}

pub fn load_config(path: &str) -> anyhow::Result<GneissConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path))?;
    serde_yaml::from_str(&raw).with_context(|| format!("invalid config file {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GneissConfig::default();
        assert_eq!(config.gnmi.endpoint, DEFAULT_GNMI_URL);
        assert_eq!(config.phaldb.endpoint, DEFAULT_PHALDB_URL);
        assert_eq!(config.logging.level(), Level::INFO);
        assert!(!config.logging.thread_names);
    }

    #[test]
    fn test_log_level_parsing() {
        let config = LogConfig {
            level: "debug".to_string(),
            thread_names: false,
        };
        assert_eq!(config.level(), Level::DEBUG);

        // Unknown levels degrade to INFO instead of failing startup.
        let config = LogConfig {
            level: "verbose".to_string(),
            thread_names: false,
        };
        assert_eq!(config.level(), Level::INFO);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
logging:
  level: debug
  thread_names: true
gnmi:
  endpoint: "0.0.0.0:10161"
"#;
        let config: GneissConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.logging.level(), Level::DEBUG);
        assert!(config.logging.thread_names);
        assert_eq!(config.gnmi.endpoint, "0.0.0.0:10161");
        assert_eq!(config.phaldb.endpoint, DEFAULT_PHALDB_URL);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let yaml = "unknown_section: {}\n";
        assert!(serde_yaml::from_str::<GneissConfig>(yaml).is_err());
    }
}
