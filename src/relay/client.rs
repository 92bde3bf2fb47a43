//! Relay service client
//!
//! Owns the pooled HTTP client shared by the poller and every device
//! channel.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::channel::RelayChannel;
use crate::types::{GateError, Result};

#[derive(Debug, Deserialize)]
struct DeviceList {
    devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    name: String,
}

#[derive(Clone)]
pub struct RelayClient {
    base: String,
    http: reqwest::Client,
    list_timeout: Duration,
}

impl RelayClient {
    pub fn new(relay_url: &str, list_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("relaygate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GateError::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base: relay_url.trim_end_matches('/').to_string(),
            http,
            list_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Origins currently connected to the relay
    pub async fn list_devices(&self) -> Result<HashSet<String>> {
        let url = format!("{}/devices", self.base);
        debug!("Polling relay for connected devices");

        let response = self
            .http
            .get(&url)
            .timeout(self.list_timeout)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(GateError::Http(format!(
                "device list returned {}",
                response.status()
            )));
        }

        let list: DeviceList = serde_json::from_slice(&response.bytes().await?)?;
        Ok(list.devices.into_iter().map(|d| d.name).collect())
    }

    /// Command endpoint of one device
    pub fn device_endpoint(&self, origin: &str) -> String {
        format!("{}/devices/{}/rgc", self.base, origin)
    }

    /// Build the channel for `origin`
    pub fn channel_for(&self, origin: &str, default_timeout: Duration) -> Arc<RelayChannel> {
        Arc::new(RelayChannel::new(
            origin,
            self.device_endpoint(origin),
            self.http.clone(),
            default_timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> RelayClient {
        RelayClient::new(uri, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let client = client("http://relay:8090/");
        assert_eq!(client.base_url(), "http://relay:8090");
        assert_eq!(
            client.device_endpoint("atv01"),
            "http://relay:8090/devices/atv01/rgc"
        );
    }

    #[tokio::test]
    async fn test_list_devices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "devices": [ { "name": "atv01" }, { "name": "atv02", "ip": "10.0.0.2" } ]
            })))
            .mount(&server)
            .await;

        let devices = client(&server.uri()).list_devices().await.unwrap();
        let expected: HashSet<String> = ["atv01", "atv02"].iter().map(|s| s.to_string()).collect();
        assert_eq!(devices, expected);
    }

    #[tokio::test]
    async fn test_list_devices_non_ok_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client(&server.uri()).list_devices().await;
        assert!(matches!(result, Err(GateError::Http(_))));
    }

    #[tokio::test]
    async fn test_channel_targets_device_endpoint() {
        let server = MockServer::start().await;
        let channel = client(&format!("{}/", server.uri()))
            .channel_for("atv07", Duration::from_secs(1));
        assert_eq!(channel.origin(), "atv07");
        assert_eq!(
            channel.endpoint(),
            format!("{}/devices/atv07/rgc", server.uri())
        );
    }
}
