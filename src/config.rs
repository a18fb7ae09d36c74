//! Configuration management for CVEMAP-RELAY
//!
//! Configuration is built once at startup and injected into the lookup client
//! and the stream assembler; no module reads ambient global state during an
//! invocation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable carrying the lookup service credential.
pub const CREDENTIAL_ENV: &str = "CVEMAP_RELAY_TOKEN";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Whether the command family is enabled at all. When false every
    /// invocation short-circuits to a fixed disabled notice.
    pub enabled: bool,
    /// Lookup service configuration
    pub lookup: LookupConfig,
    /// Heartbeat configuration
    pub heartbeat: HeartbeatConfig,
    /// Secret credential for the lookup service, sourced from the
    /// environment. Never written back out with the rest of the config.
    #[serde(skip)]
    pub credential: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookup: LookupConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            credential: String::new(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from file, then pick up the credential from the
    /// environment.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        let mut config: Self = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| Error::config(format!("Invalid YAML config: {}", e)))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| Error::config(format!("Invalid TOML config: {}", e)))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| Error::config(format!("Invalid JSON config: {}", e)))?,
            _ => return Err(Error::config("Unsupported config file format")),
        };

        config.credential = std::env::var(CREDENTIAL_ENV).unwrap_or_default();
        Ok(config)
    }

    /// Build the default configuration with the credential picked up from
    /// the environment.
    pub fn from_env() -> Self {
        Self {
            credential: std::env::var(CREDENTIAL_ENV).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.lookup.endpoint.is_empty() {
            return Err(Error::config("Lookup endpoint must not be empty"));
        }

        if self.heartbeat.interval_secs == 0 {
            return Err(Error::config("Heartbeat interval must be greater than 0"));
        }

        Ok(())
    }
}

/// Lookup service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Full endpoint URL the search request is POSTed to
    pub endpoint: String,
    /// Virtual host name sent in the Host header
    pub virtual_host: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://cvemap-api.internal.workers.dev/search".to_string(),
            virtual_host: "cvemap.internal".to_string(),
        }
    }
}

/// Heartbeat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Seconds between reassurance chunks while the lookup is in flight
    pub interval_secs: u64,
    /// The reassurance message itself
    pub message: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            message: "Still searching the vulnerability database, this can take a while...\n\n"
                .to_string(),
        }
    }
}
