//! Relay engine
//!
//! Serves a pipe read end to end: authorize the caller, resolve the team
//! and the pipe record, then either stream the pipe from the local registry
//! or forward the read to the node that owns it. Both paths hand the server
//! a streaming response right away and keep relaying in a spawned task.

use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::Stream;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::race::{copy_or_cancel, RaceOutcome};
use crate::access::{AccessControl, Credential};
use crate::directory::{PipeDirectory, PipeRecord, TeamDirectory};
use crate::error::Error;
use crate::forward::{ForwardRequest, ForwardingClient};
use crate::pipe::{Pipe, PipeReader, PipeRegistry};
use crate::routes::normalize_node_url;
use crate::transport::{response_channel, ResponseWriter, DEFAULT_RESPONSE_BUFFER};

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// This node's externally reachable URL, compared against pipe records
    pub external_url: String,
    /// Chunks buffered between a relay task and the client connection
    pub response_buffer_chunks: usize,
}

impl EngineConfig {
    pub fn new(external_url: impl Into<String>) -> Self {
        Self {
            external_url: external_url.into(),
            response_buffer_chunks: DEFAULT_RESPONSE_BUFFER,
        }
    }
}

/// External services the engine consults
pub struct Collaborators {
    pub access: Arc<dyn AccessControl>,
    pub teams: Arc<dyn TeamDirectory>,
    pub pipes: Arc<dyn PipeDirectory>,
    pub forwarder: Arc<dyn ForwardingClient>,
}

/// An inbound read
#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub team_name: String,
    pub pipe_id: String,
    pub credential: Credential,
}

/// Why a read ended before streaming started
#[derive(Debug, Error)]
pub enum ReadFailure {
    #[error("caller not authorized for team")]
    Unauthorized,

    #[error("directory lookup failed: {0}")]
    DirectoryFailure(#[source] Error),

    #[error("team not found")]
    TeamNotFound,

    #[error("pipe not found on this node")]
    PipeNotFound,

    #[error("forwarding to owning node failed: {0}")]
    ForwardingFailed(#[source] Error),
}

impl ReadFailure {
    /// Status returned to the client
    pub fn status(&self) -> StatusCode {
        match self {
            ReadFailure::Unauthorized => StatusCode::UNAUTHORIZED,
            ReadFailure::TeamNotFound | ReadFailure::PipeNotFound => StatusCode::NOT_FOUND,
            ReadFailure::DirectoryFailure(_) | ReadFailure::ForwardingFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ReadFailure {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}

/// Core of a relay node
pub struct RelayEngine {
    external_url: String,
    response_buffer: usize,
    registry: Arc<PipeRegistry>,
    access: Arc<dyn AccessControl>,
    teams: Arc<dyn TeamDirectory>,
    pipes: Arc<dyn PipeDirectory>,
    forwarder: Arc<dyn ForwardingClient>,
}

impl RelayEngine {
    pub fn new(config: EngineConfig, registry: Arc<PipeRegistry>, collaborators: Collaborators) -> Self {
        Self {
            external_url: config.external_url,
            response_buffer: config.response_buffer_chunks.max(1),
            registry,
            access: collaborators.access,
            teams: collaborators.teams,
            pipes: collaborators.pipes,
            forwarder: collaborators.forwarder,
        }
    }

    /// This node's externally reachable URL
    pub fn external_url(&self) -> &str {
        &self.external_url
    }

    /// Registry of pipes held by this node
    pub fn registry(&self) -> &Arc<PipeRegistry> {
        &self.registry
    }

    /// Whether a pipe record points at this node
    pub fn is_local(&self, record: &PipeRecord) -> bool {
        normalize_node_url(&record.url) == normalize_node_url(&self.external_url)
    }

    /// Serve one read request.
    ///
    /// Errors become an immediate empty-bodied status. On success the
    /// returned response streams the pipe while a spawned task relays it.
    pub async fn handle_read(self: &Arc<Self>, request: ReadRequest) -> Response {
        let span = info_span!(
            "read_pipe",
            request_id = %Uuid::new_v4(),
            team = %request.team_name,
            pipe_id = %request.pipe_id,
        );

        self.read(request)
            .instrument(span)
            .await
            .unwrap_or_else(IntoResponse::into_response)
    }

    async fn read(self: &Arc<Self>, request: ReadRequest) -> Result<Response, ReadFailure> {
        debug!("Read pipe");

        if !self.access.is_authorized(&request.credential, &request.team_name) {
            info!("Team not authorized to read pipe");
            return Err(ReadFailure::Unauthorized);
        }

        let team = match self.teams.find_team(&request.team_name).await {
            Ok(Some(team)) => team,
            Ok(None) => {
                info!("Team not found");
                return Err(ReadFailure::TeamNotFound);
            }
            Err(e) => {
                error!(error = %e.format_for_log(), "Failed to get team from directory");
                return Err(ReadFailure::DirectoryFailure(e));
            }
        };

        // A missing record lands here too and is reported as 500
        let record = self
            .pipes
            .get_pipe(&team, &request.pipe_id)
            .await
            .map_err(|e| {
                error!(error = %e.format_for_log(), "Failed to get pipe");
                ReadFailure::DirectoryFailure(e)
            })?;

        if self.is_local(&record) {
            self.read_local(&request.pipe_id)
        } else {
            self.read_remote(request, record).await
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Local path
    // ─────────────────────────────────────────────────────────────

    fn read_local(self: &Arc<Self>, pipe_id: &str) -> Result<Response, ReadFailure> {
        let Some(pipe) = self.registry.lookup(pipe_id) else {
            info!("Pipe not in local registry");
            return Err(ReadFailure::PipeNotFound);
        };
        let Some(reader) = pipe.take_reader() else {
            info!("Pipe already being read");
            return Err(ReadFailure::PipeNotFound);
        };

        let (writer, body) = response_channel(self.response_buffer);
        tokio::spawn(Arc::clone(self).relay_local(pipe, reader, writer).in_current_span());

        Ok((StatusCode::OK, Body::from_stream(body)).into_response())
    }

    async fn relay_local(self: Arc<Self>, pipe: Pipe, reader: PipeReader, mut writer: ResponseWriter) {
        // The client must not see end of body before the entry is gone
        let guard = writer.keep_open();

        if writer.flush().await.is_err() {
            debug!("Client left before headers were flushed");
        }

        let producer = pipe.clone();
        let outcome = copy_or_cancel(reader.into_stream(), writer, move || producer.close_write()).await;

        self.registry.remove(pipe.id());
        drop(guard);

        match outcome {
            RaceOutcome::Completed { bytes } => info!(bytes, "Pipe read complete"),
            RaceOutcome::ClientGone { bytes } => {
                info!(bytes, "Client disconnected, closed pipe write end")
            }
            RaceOutcome::SourceFailed { bytes } => warn!(bytes, "Pipe stream failed"),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Forwarding path
    // ─────────────────────────────────────────────────────────────

    async fn read_remote(
        self: &Arc<Self>,
        request: ReadRequest,
        record: PipeRecord,
    ) -> Result<Response, ReadFailure> {
        info!(pipe_url = %record.url, "Forwarding pipe read request");

        let forward = ForwardRequest {
            peer_url: record.url,
            team_name: request.team_name,
            pipe_id: request.pipe_id,
            credential: request.credential,
        };

        let response = self.forwarder.send(&forward).await.map_err(|e| {
            error!(
                pipe_url = %forward.peer_url,
                error = %e.format_for_log(),
                "Failed to forward request"
            );
            ReadFailure::ForwardingFailed(e)
        })?;

        let (writer, body) = response_channel(self.response_buffer);
        tokio::spawn(relay_remote(response.body, writer).in_current_span());

        Ok((response.status, Body::from_stream(body)).into_response())
    }
}

async fn relay_remote<S>(source: S, mut writer: ResponseWriter)
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    if writer.flush().await.is_err() {
        debug!("Client left before headers were flushed");
    }
    let committed = writer.headers_committed();

    let outcome = copy_or_cancel(source, writer, move || {
        // Nothing to cancel upstream; the owning node sees this node hang up
        // and runs its own cleanup. A 504 can only reach the client if the
        // status line never went out.
        debug!(
            status = StatusCode::GATEWAY_TIMEOUT.as_u16(),
            delivered = !committed,
            "Client disconnected from forwarded read"
        );
    })
    .await;

    match outcome {
        RaceOutcome::Completed { bytes } => info!(bytes, "Forwarded read complete"),
        RaceOutcome::ClientGone { bytes } => info!(bytes, "Client disconnected"),
        RaceOutcome::SourceFailed { bytes } => {
            warn!(bytes, "Owning node stream failed, response truncated")
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
