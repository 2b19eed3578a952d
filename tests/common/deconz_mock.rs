//! WireMock-based deCONZ gateway
//!
//! Serves the REST endpoints the bridge talks to: the sensor list, the
//! gateway configuration, pairing and the discovery service.

use deflux::sensors::Sensors;
use serde_json::{json, Map, Value};
use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const API_KEY: &str = "0123456789";

/// Mock gateway for testing
pub struct MockDeconzGateway {
    pub server: MockServer,
}

impl MockDeconzGateway {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// REST API base address, e.g. `http://127.0.0.1:4711/api`
    pub fn api_url(&self) -> Url {
        Url::parse(&format!("{}/api", self.server.uri())).unwrap()
    }

    /// Discovery endpoint served by this mock
    pub fn discovery_url(&self) -> Url {
        Url::parse(&format!("{}/discover", self.server.uri())).unwrap()
    }

    /// Serve `sensors` the way the gateway lists them, keyed by id string
    pub async fn mount_sensors(&self, sensors: &Sensors) {
        let mut body = Map::new();
        for (id, meta) in sensors {
            body.insert(
                id.to_string(),
                json!({
                    "name": meta.name,
                    "type": meta.type_tag,
                    "modelid": meta.model_id,
                    "manufacturername": meta.manufacturer,
                    "uniqueid": meta.unique_id,
                    "config": { "on": true, "reachable": true },
                    "state": { "lastupdated": "2018-03-08T19:35:24" }
                }),
            );
        }
        self.mount_sensors_body(Value::Object(body)).await;
    }

    /// Serve an arbitrary body for the sensor list
    pub async fn mount_sensors_body(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/{API_KEY}/sensors")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer the sensor list with a server error
    pub async fn mount_sensors_failure(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/api/{API_KEY}/sensors")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_config(&self, websocket_port: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/api/{API_KEY}/config")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "deCONZ-GW",
                "apiversion": "1.0.4",
                "websocketport": websocket_port,
                "websocketnotifyall": true
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_pair_success(&self, username: &str) {
        Mock::given(method("POST"))
            .and(path("/api"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "success": { "username": username } }])),
            )
            .mount(&self.server)
            .await;
    }

    /// Gateway that has not been unlocked for pairing
    pub async fn mount_pair_locked(&self) {
        Mock::given(method("POST"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!([{
                "error": {
                    "address": "/",
                    "description": "unauthorized user",
                    "type": 1
                }
            }])))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_discovery(&self, gateways: Value) {
        Mock::given(method("GET"))
            .and(path("/discover"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gateways))
            .mount(&self.server)
            .await;
    }
}
