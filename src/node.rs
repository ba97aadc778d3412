//! A relay node assembled from configuration
//!
//! Wires the registry, the in-memory directory, token access control and
//! the HTTP forwarder into a [`RelayEngine`], and owns the listener.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::access::TokenAccessControl;
use crate::config::RelayConfig;
use crate::directory::MemoryDirectory;
use crate::error::{Error, Result};
use crate::forward::{HttpForwarder, HttpForwarderConfig};
use crate::pipe::PipeRegistry;
use crate::relay::{Collaborators, EngineConfig, RelayEngine};
use crate::server;

/// One member of the relay cluster
pub struct RelayNode {
    config: RelayConfig,
    registry: Arc<PipeRegistry>,
    directory: Arc<MemoryDirectory>,
    access: Arc<TokenAccessControl>,
    engine: Arc<RelayEngine>,
}

impl RelayNode {
    /// Build a node with its own directory seeded from `[directory]`
    pub fn from_config(config: RelayConfig) -> Result<Self> {
        let directory = Arc::new(MemoryDirectory::with_teams(&config.directory.teams));
        Self::with_directory(config, directory)
    }

    /// Build a node reading pipe records from `directory`, which may be
    /// shared with other nodes in the same process
    pub fn with_directory(config: RelayConfig, directory: Arc<MemoryDirectory>) -> Result<Self> {
        for team in &config.directory.teams {
            directory.add_team(team);
        }

        let registry = Arc::new(PipeRegistry::new());
        let access = Arc::new(TokenAccessControl::from_settings(&config.auth));
        let forwarder = Arc::new(HttpForwarder::new(HttpForwarderConfig::from(&config.forwarding))?);

        let engine = Arc::new(RelayEngine::new(
            EngineConfig {
                external_url: config.node.external_url.clone(),
                response_buffer_chunks: config.relay.response_buffer_chunks,
            },
            Arc::clone(&registry),
            Collaborators {
                access: access.clone(),
                teams: directory.clone(),
                pipes: directory.clone(),
                forwarder,
            },
        ));

        info!(
            external_url = %config.node.external_url,
            teams = directory.team_count(),
            tokens = access.len(),
            "Relay node initialized"
        );

        Ok(Self {
            config,
            registry,
            directory,
            access,
            engine,
        })
    }

    /// URL pipe records must carry to be served from this node
    pub fn external_url(&self) -> &str {
        &self.config.node.external_url
    }

    /// Live pipes held by this node
    pub fn registry(&self) -> &Arc<PipeRegistry> {
        &self.registry
    }

    pub fn directory(&self) -> &Arc<MemoryDirectory> {
        &self.directory
    }

    pub fn access(&self) -> &Arc<TokenAccessControl> {
        &self.access
    }

    pub fn engine(&self) -> &Arc<RelayEngine> {
        &self.engine
    }

    /// Buffer size for pipes created on this node
    pub fn pipe_buffer_bytes(&self) -> usize {
        self.config.relay.pipe_buffer_bytes
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_addr()?;
        TcpListener::bind(addr).await.map_err(|e| Error::Bind {
            address: addr.to_string(),
            source: e,
        })
    }

    /// Serve reads on `listener` until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        server::serve(listener, Arc::clone(&self.engine), shutdown).await
    }
}
