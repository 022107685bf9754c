//! HTTP/WebSocket transport for the engine.
//!
//! One axum router serves the WebSocket endpoint (`/ws`) through which clients receive
//! device broadcasts and send control messages, plus the REST API under `/api`.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, put};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::engine::Engine;

mod api;
mod ws;

pub use api::{ApiError, ConnectNodesRequest, UpdateNodeRequest};

/// Banner returned by `GET /`.
pub const ROOT_BANNER: &str = "streamweave-telemetry is running";

/// Builds the application router around a shared engine.
pub fn router(engine: Arc<Engine>) -> Router {
  Router::new()
    .route("/", get(|| async { ROOT_BANNER }))
    .route("/ws", get(ws::upgrade))
    .route("/api/nodes", get(api::list_nodes).post(api::create_node))
    .route("/api/nodes/:node_id", put(api::update_node))
    .route(
      "/api/pipelines",
      get(api::list_pipelines).post(api::connect_nodes),
    )
    .route("/api/devices/:device_id", get(api::get_device))
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(engine)
}

/// Serves the router on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, engine: Arc<Engine>, shutdown: F) -> std::io::Result<()>
where
  F: Future<Output = ()> + Send + 'static,
{
  if let Ok(addr) = listener.local_addr() {
    info!(%addr, "listening (WebSocket at /ws)");
  }
  axum::serve(listener, router(engine))
    .with_graceful_shutdown(shutdown)
    .await
}
