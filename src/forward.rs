//! Forwarding reads to the node that owns a pipe

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::Client;
use tracing::{debug, info};

use crate::access::Credential;
use crate::config::ForwardingSettings;
use crate::error::{Error, Result};
use crate::routes;
use crate::version;

/// A read to replay against the owning node
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    /// Owning node's base URL, exactly as stored in the pipe record
    pub peer_url: String,
    pub team_name: String,
    pub pipe_id: String,
    /// Caller's credential, passed through unchanged
    pub credential: Credential,
}

/// The owning node's answer: its status and a stream of body bytes
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

impl fmt::Debug for ForwardedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardedResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Transport used to reach peer nodes
#[async_trait]
pub trait ForwardingClient: Send + Sync {
    /// Issue the read against `request.peer_url`. Resolves once the peer's
    /// status line is in; the body streams afterwards.
    async fn send(&self, request: &ForwardRequest) -> Result<ForwardedResponse>;
}

// ─────────────────────────────────────────────────────────────────
// HTTP forwarder
// ─────────────────────────────────────────────────────────────────

/// HTTP forwarder configuration
#[derive(Debug, Clone)]
pub struct HttpForwarderConfig {
    /// Limit on establishing the connection to the peer. There is no limit
    /// on the request as a whole since pipe streams are unbounded.
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
}

impl Default for HttpForwarderConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl From<&ForwardingSettings> for HttpForwarderConfig {
    fn from(settings: &ForwardingSettings) -> Self {
        Self {
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            pool_idle_timeout: Duration::from_millis(settings.pool_idle_timeout_ms),
        }
    }
}

/// Forwards reads over HTTP using the same route peers serve
pub struct HttpForwarder {
    client: Client,
}

impl HttpForwarder {
    pub fn new(config: HttpForwarderConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(version::build_info().user_agent())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            connect_timeout_ms = config.connect_timeout.as_millis() as u64,
            "HTTP forwarder created"
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl ForwardingClient for HttpForwarder {
    async fn send(&self, request: &ForwardRequest) -> Result<ForwardedResponse> {
        let url = routes::read_pipe_url(&request.peer_url, &request.team_name, &request.pipe_id)?;
        debug!(url = %url, "Forwarding read");

        let mut req = self.client.get(url);
        if let Some(auth) = request.credential.authorization_header() {
            req = req.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = req
            .send()
            .await
            .map_err(|e| classify(&request.peer_url, e))?;

        // reqwest speaks http 0.2 and axum http 1, so the code crosses as a number
        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| Error::forwarding_failed(&request.peer_url, e.to_string()))?;
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e)))
            .boxed();

        Ok(ForwardedResponse { status, body })
    }
}

fn classify(peer_url: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::ForwardingTimeout {
            url: peer_url.to_string(),
        }
    } else if err.is_connect() {
        Error::ForwardingRefused {
            url: peer_url.to_string(),
        }
    } else {
        Error::forwarding_failed(peer_url, err.to_string())
    }
}
