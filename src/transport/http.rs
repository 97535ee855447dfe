use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::transport::{CommandResult, StateDelta};

const REQUEST_ID_OVERRIDE_ENV: &str = "ODONET_REQUEST_ID_OVERRIDE";

/// Transport failures, classified so callers can react to each kind
/// instead of parsing error strings.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("server returned status {0}")]
    Server(StatusCode),
    #[error("malformed JSON body: {0}")]
    Decode(#[source] serde_json::Error),
}

/// HTTP plumbing shared by the poller and the command channel.
///
/// The base URL is the only state and is never mutated after
/// construction.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

fn request_id() -> String {
    std::env::var(REQUEST_ID_OVERRIDE_ENV).unwrap_or_else(|_| Uuid::new_v4().to_string())
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the server for the fields that changed since the last call.
    pub async fn fetch_update(&self) -> Result<StateDelta, TransportError> {
        let url = format!("{}/update", self.base_url);
        trace!(url = %url, "polling for state delta");

        let body = self
            .get_checked(&url)
            .await?
            .text()
            .await
            .map_err(TransportError::Network)?;

        serde_json::from_str(&body).map_err(TransportError::Decode)
    }

    /// Post a command payload to `/data/{subject}` and decode the reply.
    pub async fn send_command<T: Serialize>(
        &self,
        subject: &str,
        payload: &T,
    ) -> Result<CommandResult, TransportError> {
        let url = format!("{}/data/{}", self.base_url, subject);
        let body = serde_json::to_vec(payload).map_err(TransportError::Decode)?;

        debug!(url = %url, subject = %subject, "sending command");

        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Request-Id", request_id())
            .body(body)
            .send()
            .await
            .map_err(TransportError::Network)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Server(status));
        }

        let body = resp.text().await.map_err(TransportError::Network)?;
        serde_json::from_str(&body).map_err(TransportError::Decode)
    }

    /// Download a server-side asset referenced by a delta (image paths
    /// land here). The body is returned as-is, never inspected.
    pub async fn fetch_file(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        let url = format!("{}/files/{}", self.base_url, path.trim_start_matches('/'));
        debug!(url = %url, "fetching file");

        let bytes = self
            .get_checked(&url)
            .await?
            .bytes()
            .await
            .map_err(TransportError::Network)?;

        Ok(bytes.to_vec())
    }

    async fn get_checked(&self, url: &str) -> Result<reqwest::Response, TransportError> {
        let resp = self
            .client
            .get(url)
            .header("X-Request-Id", request_id())
            .send()
            .await
            .map_err(TransportError::Network)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Server(status));
        }
        Ok(resp)
    }
}
