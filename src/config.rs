//! Configuration for the deflux bridge
//!
//! Configuration is read from a TOML file and can be overridden per key with
//! environment variables, e.g. `DEFLUX_DECONZ__API_KEY=0A1B2C3D4E` or
//! `DEFLUX_PUMP__RECONNECTION__INITIAL_DELAY=10s`.
//!
//! Without an explicit path the first existing file among `./deflux.toml`,
//! `$XDG_CONFIG_HOME/deflux/deflux.toml` and `/etc/deflux.toml` is used.

use crate::discovery::DEFAULT_DISCOVERY_ENDPOINT;
use crate::error::{DefluxError, Result};
use crate::services::ReconnectionConfig;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "deflux.toml";

/// Placeholder written by `default-config` when no API key could be obtained
pub const API_KEY_PLACEHOLDER: &str = "change me";

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "DEFLUX";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefluxConfig {
    pub deconz: DeconzConfig,
    pub pump: PumpConfig,
    pub logging: LoggingConfig,
}

/// Gateway connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeconzConfig {
    /// REST API base address, e.g. `http://192.168.1.90:8080/api`
    pub addr: Url,

    /// API key obtained by pairing
    pub api_key: String,

    /// Websocket address, discovered through the REST API when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websocket_addr: Option<Url>,

    /// Timeout for REST calls and the websocket handshake
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Gateway discovery service
    pub discovery_endpoint: Url,
}

impl Default for DeconzConfig {
    fn default() -> Self {
        Self {
            addr: default_url("http://127.0.0.1:8080/api"),
            api_key: API_KEY_PLACEHOLDER.to_string(),
            websocket_addr: None,
            timeout: Duration::from_secs(10),
            discovery_endpoint: default_url(DEFAULT_DISCOVERY_ENDPOINT),
        }
    }
}

fn default_url(s: &str) -> Url {
    Url::parse(s).expect("Built-in URL should be valid")
}

/// Event pump settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Capacity of the output channel before the pump blocks
    pub channel_capacity: usize,

    pub reconnection: ReconnectionConfig,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            reconnection: ReconnectionConfig::default(),
        }
    }
}

/// Logging settings, environment variables read by the logger take precedence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "deflux=debug"
    pub level: String,

    /// Optional log file, rotated daily
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Emit JSON records instead of text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
        }
    }
}

impl DefluxConfig {
    /// Load configuration from `path`, or from the first default location.
    ///
    /// Environment overrides are applied in both cases. Without any file the
    /// defaults plus environment are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let file = match path {
            Some(path) if !path.exists() => {
                return Err(DefluxError::config(format!(
                    "Configuration file {} does not exist",
                    path.display()
                )));
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_locations().into_iter().find(|p| p.exists()),
        };

        if let Some(file) = &file {
            info!(path = %file.display(), "Using configuration file");
            builder = builder.add_source(File::from(file.as_path()).format(FileFormat::Toml));
        }

        let config: DefluxConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Candidate configuration files in lookup order
    pub fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            locations.push(dir.join("deflux").join(CONFIG_FILE_NAME));
        }
        locations.push(Path::new("/etc").join(CONFIG_FILE_NAME));
        locations
    }

    /// Reject configurations that cannot work
    pub fn validate(&self) -> Result<()> {
        let key = self.deconz.api_key.trim();
        if key.is_empty() || key == API_KEY_PLACEHOLDER {
            return Err(DefluxError::config(
                "deconz.api_key is not set, pair with the gateway first",
            ));
        }
        if !matches!(self.deconz.addr.scheme(), "http" | "https") {
            return Err(DefluxError::config(format!(
                "deconz.addr must be an http(s) URL, got {}",
                self.deconz.addr
            )));
        }
        if let Some(ws) = &self.deconz.websocket_addr {
            if !matches!(ws.scheme(), "ws" | "wss") {
                return Err(DefluxError::config(format!(
                    "deconz.websocket_addr must be a ws(s) URL, got {ws}"
                )));
            }
        }
        if self.deconz.timeout.is_zero() {
            return Err(DefluxError::config("deconz.timeout must be greater than zero"));
        }
        if self.pump.channel_capacity == 0 {
            return Err(DefluxError::config(
                "pump.channel_capacity must be greater than zero",
            ));
        }
        let reconnection = &self.pump.reconnection;
        if reconnection.backoff_multiplier < 1.0 || !reconnection.backoff_multiplier.is_finite() {
            return Err(DefluxError::config(
                "pump.reconnection.backoff_multiplier must be at least 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&reconnection.jitter_factor) {
            return Err(DefluxError::config(
                "pump.reconnection.jitter_factor must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DefluxError::config(format!("Unable to render configuration: {e}")))
    }
}
