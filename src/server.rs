//! HTTP surface of a relay node

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::access::Credential;
use crate::error::Result;
use crate::relay::{ReadRequest, RelayEngine};
use crate::routes;

/// Build the router serving the read endpoint
pub fn router(engine: Arc<RelayEngine>) -> Router {
    Router::new()
        .route(routes::READ_PIPE, get(read_pipe))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn read_pipe(
    State(engine): State<Arc<RelayEngine>>,
    Path((team_name, pipe_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let request = ReadRequest {
        team_name,
        pipe_id,
        credential: Credential::from_headers(&headers),
    };
    engine.handle_read(request).await
}

/// Serve on `listener` until `shutdown` resolves, then wait for open
/// connections to finish
pub async fn serve<F>(listener: TcpListener, engine: Arc<RelayEngine>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(
        %addr,
        external_url = %engine.external_url(),
        "Relay node listening"
    );

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Relay node stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::TokenAccessControl;
    use crate::directory::MemoryDirectory;
    use crate::forward::{HttpForwarder, HttpForwarderConfig};
    use crate::pipe::{Pipe, PipeRegistry};
    use crate::relay::{Collaborators, EngineConfig};

    #[tokio::test]
    async fn test_serves_read_route() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let directory = Arc::new(MemoryDirectory::with_teams(["main"]));
        directory.put_pipe("main", "p1", &base).unwrap();
        let access = Arc::new(TokenAccessControl::new());
        access.grant("t1", "main");

        let registry = Arc::new(PipeRegistry::new());
        let pipe = Pipe::new("p1", 64);
        let writer = pipe.writer();
        writer.write_all(b"hello").await.unwrap();
        writer.close();
        registry.insert("p1", pipe);

        let engine = Arc::new(RelayEngine::new(
            EngineConfig::new(&base),
            Arc::clone(&registry),
            Collaborators {
                access,
                teams: directory.clone(),
                pipes: directory,
                forwarder: Arc::new(HttpForwarder::new(HttpForwarderConfig::default()).unwrap()),
            },
        ));

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, engine, async {
            let _ = stopped.await;
        }));

        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/teams/main/pipes/p1", base);

        let denied = client.get(&url).send().await.unwrap();
        assert_eq!(denied.status().as_u16(), 401);

        let response = client.get(&url).bearer_auth("t1").send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.bytes().await.unwrap().as_ref(), b"hello");
        assert!(registry.is_empty());

        let missing = client
            .get(format!("{}/api/v1/teams/main", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 404);

        drop(client);
        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
