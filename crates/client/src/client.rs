//! WebSocket client for per-job push connections.
//!
//! [`PushClient`] holds the base address and user for the push channel.
//! Call [`PushClient::connect`] to open the dedicated connection for one
//! job.

use genbridge_core::types::JobId;
use reqwest::Url;
use tokio_tungstenite::{connect_async, MaybeTlsStream};

use crate::api::endpoint_url;

/// The WebSocket stream type produced by [`PushClient::connect`].
pub type PushStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for the push channel.
#[derive(Debug, Clone)]
pub struct PushClient {
    ws_url: String,
    user_id: String,
}

impl PushClient {
    /// * `ws_url`  - WebSocket base URL, e.g. `ws://host:8000`.
    /// * `user_id` - user the jobs belong to.
    pub fn new(ws_url: String, user_id: String) -> Self {
        Self { ws_url, user_id }
    }

    /// Full push URL for one job: `{ws_url}/ws/{user_id}/{job_id}`, with
    /// both ids percent-encoded as single path segments.
    pub fn url_for(&self, job_id: &JobId) -> Result<Url, PushClientError> {
        endpoint_url(
            &self.ws_url,
            ["ws", self.user_id.as_str(), job_id.as_str()],
        )
        .map_err(|e| PushClientError::InvalidUrl(format!("{}: {e}", self.ws_url)))
    }

    /// Perform the WebSocket handshake for `job_id`'s push connection.
    pub async fn connect(&self, job_id: &JobId) -> Result<PushStream, PushClientError> {
        let url = self.url_for(job_id)?;

        let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            PushClientError::Connection(format!("Failed to connect to {url}: {e}"))
        })?;

        tracing::debug!(job_id = %job_id, url = %url, "Push channel connected");
        Ok(ws_stream)
    }
}

/// Errors that can occur when opening a push connection.
#[derive(Debug, thiserror::Error)]
pub enum PushClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The push address for a job could not be built.
    #[error("Invalid push URL: {0}")]
    InvalidUrl(String),
}
