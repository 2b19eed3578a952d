//! Gateway discovery through the Phoscon discovery service
//!
//! Gateways report their internal address to the vendor's discovery endpoint,
//! which returns every gateway seen from the caller's public IP.

use crate::error::{DefluxError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Default discovery endpoint
pub const DEFAULT_DISCOVERY_ENDPOINT: &str = "https://phoscon.de/discover";

/// One gateway as reported by the discovery service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredGateway {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "macaddress", default)]
    pub mac_address: String,
    #[serde(rename = "internalipaddress")]
    pub internal_ip_address: String,
    #[serde(rename = "internalport", default = "default_port")]
    pub internal_port: u16,
    #[serde(rename = "publicipaddress", default)]
    pub public_ip_address: String,
}

fn default_port() -> u16 {
    80
}

impl DiscoveredGateway {
    /// REST API base address of the gateway
    pub fn api_url(&self) -> Result<Url> {
        let host = if self.internal_ip_address.contains(':') {
            format!("[{}]", self.internal_ip_address)
        } else {
            self.internal_ip_address.clone()
        };
        Url::parse(&format!("http://{host}:{}/api", self.internal_port)).map_err(|e| {
            DefluxError::discovery(format!(
                "Gateway {} reported unusable address {}: {e}",
                self.name, self.internal_ip_address
            ))
        })
    }
}

/// Ask the discovery service for gateways on the local network
pub async fn discover_gateways(endpoint: &Url, timeout: Duration) -> Result<Vec<DiscoveredGateway>> {
    info!(endpoint = %endpoint, "Discovering deCONZ gateways");

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let gateways: Vec<DiscoveredGateway> = client
        .get(endpoint.clone())
        .send()
        .await
        .map_err(|e| DefluxError::discovery(format!("Unable to reach discovery endpoint: {e}")))?
        .error_for_status()?
        .json()
        .await
        .map_err(|e| DefluxError::discovery(format!("Unreadable discovery response: {e}")))?;

    if gateways.is_empty() {
        return Err(DefluxError::discovery("No gateways were found"));
    }

    for gateway in &gateways {
        debug!(
            name = %gateway.name,
            address = %gateway.internal_ip_address,
            port = gateway.internal_port,
            "Found gateway"
        );
    }
    info!(count = gateways.len(), "Discovery finished");
    Ok(gateways)
}
