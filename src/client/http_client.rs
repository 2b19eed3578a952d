//! HTTP client for the deCONZ REST API
//!
//! Covers the three calls the event bridge needs: listing sensors, looking
//! up the websocket port and requesting an API key.

use crate::config::DeconzConfig;
use crate::error::{DefluxError, Result};
use crate::sensors::{SensorFetcher, SensorId, SensorMeta, Sensors};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Subset of the gateway configuration object
#[derive(Debug, Deserialize)]
struct GatewayConfig {
    #[serde(rename = "websocketport")]
    websocket_port: u16,
}

#[derive(Debug, Serialize)]
struct PairRequest<'a> {
    devicetype: &'a str,
}

#[derive(Debug, Deserialize)]
struct PairSuccess {
    success: PairUsername,
}

#[derive(Debug, Deserialize)]
struct PairUsername {
    username: String,
}

#[derive(Debug, Deserialize)]
struct GatewayFailure {
    error: GatewayErrorBody,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    #[serde(default)]
    description: String,
}

/// REST client for one gateway
#[derive(Debug, Clone)]
pub struct DeconzHttpClient {
    client: Client,
    addr: Url,
    api_key: String,
}

impl DeconzHttpClient {
    /// Create a client from the gateway configuration
    pub fn new(config: &DeconzConfig) -> Result<Self> {
        Self::with_timeout(config.addr.clone(), config.api_key.clone(), config.timeout)
    }

    /// Create a client for an API base address such as `http://10.0.0.2/api`
    pub fn with_timeout(addr: Url, api_key: String, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(format!("deflux/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DefluxError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            addr,
            api_key,
        })
    }

    pub fn addr(&self) -> &Url {
        &self.addr
    }

    /// URL of a resource below the API key, e.g. `{addr}/{key}/sensors`
    fn resource_url(&self, resource: &str) -> Url {
        let mut url = self.addr.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}/{}/{resource}", self.api_key));
        url
    }

    /// Fetch every sensor the gateway knows about.
    ///
    /// Entries whose key is not numeric or whose body lacks a name or type
    /// are skipped.
    pub async fn sensors(&self) -> Result<Sensors> {
        let url = self.resource_url("sensors");
        debug!(url = %self.redacted(&url), "Fetching sensors");

        let body: HashMap<String, serde_json::Value> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut sensors = Sensors::with_capacity(body.len());
        for (key, value) in body {
            let id: SensorId = match key.parse() {
                Ok(id) => id,
                Err(_) => {
                    warn!(key = %key, "Skipping sensor with non-numeric id");
                    continue;
                }
            };
            match serde_json::from_value::<SensorMeta>(value) {
                Ok(mut meta) => {
                    meta.id = id;
                    sensors.insert(id, meta);
                }
                Err(e) => warn!(sensor_id = id, "Skipping unreadable sensor entry: {e}"),
            }
        }

        debug!(sensor_count = sensors.len(), "Fetched sensors");
        Ok(sensors)
    }

    /// Resolve the websocket address from the gateway's `websocketport`
    pub async fn websocket_address(&self) -> Result<Url> {
        let url = self.resource_url("config");
        debug!(url = %self.redacted(&url), "Discovering websocket port");

        let config: GatewayConfig = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let host = self
            .addr
            .host_str()
            .ok_or_else(|| DefluxError::config(format!("Gateway address {} has no host", self.addr)))?;

        let ws = Url::parse(&format!("ws://{host}:{}/", config.websocket_port))
            .map_err(|e| DefluxError::config(format!("Invalid websocket address: {e}")))?;
        info!(websocket = %ws, "Discovered websocket address");
        Ok(ws)
    }

    /// Request a new API key. The gateway must be unlocked in its web UI first.
    pub async fn pair(&self, device_type: &str) -> Result<String> {
        let mut url = self.addr.clone();
        url.set_path("/api");
        url.set_query(None);
        info!(url = %url, device_type, "Requesting API key");

        let response = self
            .client
            .post(url)
            .json(&PairRequest {
                devicetype: device_type,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::FORBIDDEN {
            let failures: Vec<GatewayFailure> = serde_json::from_str(&body).map_err(|e| {
                DefluxError::pairing(format!("Unreadable failure from gateway: {e}"))
            })?;
            let description = failures
                .into_iter()
                .next()
                .map(|f| f.error.description)
                .unwrap_or_else(|| "gateway refused pairing".to_string());
            return Err(DefluxError::pairing(description));
        }

        if status != StatusCode::OK {
            return Err(DefluxError::pairing(format!(
                "Unexpected status {status} from gateway: {body}"
            )));
        }

        let successes: Vec<PairSuccess> = serde_json::from_str(&body)
            .map_err(|e| DefluxError::pairing(format!("Unreadable pairing response: {e}")))?;
        successes
            .into_iter()
            .next()
            .map(|s| s.success.username)
            .ok_or_else(|| DefluxError::pairing("Gateway returned no API key"))
    }

    /// Log-safe rendering of a URL that contains the API key
    fn redacted(&self, url: &Url) -> String {
        if self.api_key.is_empty() {
            url.to_string()
        } else {
            url.as_str().replace(&self.api_key, "***")
        }
    }
}

#[async_trait]
impl SensorFetcher for DeconzHttpClient {
    async fn fetch_all_sensors(&self) -> Result<Sensors> {
        self.sensors().await
    }
}
