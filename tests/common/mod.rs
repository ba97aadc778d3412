//! Common test utilities
//!
//! Starts relay nodes on ephemeral ports that share one in-memory directory,
//! so a read can be sent to any node in the cluster.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use pipe_relay::config::TokenGrant;
use pipe_relay::{MemoryDirectory, Pipe, PipeWriter, RelayConfig, RelayNode};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const TEAM: &str = "main";
pub const TOKEN: &str = "cluster-token";

/// A node serving on a loopback port
pub struct TestNode {
    pub node: Arc<RelayNode>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<pipe_relay::Result<()>>>,
}

impl TestNode {
    /// Start a node whose external URL is its bound loopback address
    pub async fn start(directory: Arc<MemoryDirectory>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut config = RelayConfig::default();
        config.node.external_url = format!("http://{}", addr);
        config.node.bind_address = addr.to_string();
        config.directory.teams = vec![TEAM.to_string()];
        config.auth.tokens.push(TokenGrant {
            token: TOKEN.to_string(),
            teams: vec![TEAM.to_string()],
            admin: false,
        });
        config.forwarding.connect_timeout_ms = 1000;

        let node = Arc::new(RelayNode::with_directory(config, directory).unwrap());
        let (tx, rx) = oneshot::channel::<()>();
        let serving = Arc::clone(&node);
        let handle = tokio::spawn(async move {
            serving
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
        });

        Self {
            node,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> &str {
        self.node.external_url()
    }

    /// Create a pipe on this node and publish its record in the directory
    pub fn host_pipe(&self, pipe_id: &str) -> (Pipe, PipeWriter) {
        let pipe = Pipe::new(pipe_id, self.node.pipe_buffer_bytes());
        let writer = pipe.writer();
        self.node.registry().insert(pipe_id, pipe.clone());
        self.node
            .directory()
            .put_pipe(TEAM, pipe_id, self.node.external_url())
            .unwrap();
        (pipe, writer)
    }

    /// URL to read `pipe_id` of `team` through this node
    pub fn read_url(&self, team: &str, pipe_id: &str) -> String {
        format!("{}/api/v1/teams/{}/pipes/{}", self.url(), team, pipe_id)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }
}

/// Two nodes sharing one directory
pub async fn start_pair() -> (Arc<MemoryDirectory>, TestNode, TestNode) {
    let directory = Arc::new(MemoryDirectory::new());
    let a = TestNode::start(Arc::clone(&directory)).await;
    let b = TestNode::start(Arc::clone(&directory)).await;
    (directory, a, b)
}

/// Poll `condition` until it holds or a few seconds pass
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
