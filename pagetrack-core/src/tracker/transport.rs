//! Transports used by the flush controller
//!
//! Two capabilities are injected into the controller:
//! - [`Transport`]: the regular send, whose outcome drives retry
//! - [`Beacon`]: the best-effort exit send, which reports nothing back
//!
//! ## Body encodings
//!
//! Regular flushes post `-` followed by the JSON array so the server can
//! tell them apart from a plain JSON body. Beacons post the plain array.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tokio::runtime::Handle;

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::types::Event;

/// Marker prefixed to bodies sent by the regular flush path
pub const SENTINEL: char = '-';

/// Encode a payload for the regular flush path (`-[...]`)
pub fn encode_batch(events: &[Event]) -> Result<String> {
    let json = serde_json::to_string(events)?;
    let mut body = String::with_capacity(json.len() + 1);
    body.push(SENTINEL);
    body.push_str(&json);
    Ok(body)
}

/// Encode a payload for the exit beacon (plain JSON array)
pub fn encode_beacon(events: &[Event]) -> Result<String> {
    Ok(serde_json::to_string(events)?)
}

/// Regular send capability.
///
/// `Ok` means the endpoint accepted the request with a success status.
/// Any `Err` is treated as a transport failure and the payload is retried.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, body: String) -> Result<()>;
}

/// Best-effort exit send capability.
///
/// Must not block and has no failure channel.
pub trait Beacon: Send + Sync {
    fn send_beacon(&self, body: String);
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))
}

/// HTTP transport posting to the ingestion endpoint
pub struct HttpTransport {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a new transport from configuration
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            http_client: build_client(config.timeout())?,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: String) -> Result<()> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Err(Error::Transport(format!(
            "API error ({}): {}",
            status, error_text
        )))
    }
}

/// HTTP beacon: fires a detached request and forgets about it
pub struct HttpBeacon {
    http_client: reqwest::Client,
    endpoint: String,
    runtime: Handle,
}

impl HttpBeacon {
    /// Create a new beacon from configuration
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("beacon needs a tokio runtime: {}", e)))?;

        Ok(Self {
            http_client: build_client(config.timeout())?,
            endpoint: config.endpoint.clone(),
            runtime,
        })
    }
}

impl Beacon for HttpBeacon {
    fn send_beacon(&self, body: String) {
        let request = self.http_client.post(&self.endpoint).body(body);
        self.runtime.spawn(async move {
            match request.send().await {
                Ok(response) => {
                    tracing::debug!(status = %response.status(), "Exit beacon delivered")
                }
                Err(e) => tracing::debug!(error = %e, "Exit beacon failed"),
            }
        });
    }
}
