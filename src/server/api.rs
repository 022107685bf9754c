//! REST API over the store: nodes, pipelines and current device state.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::engine::Engine;
use crate::error::TelemetryError;
use crate::store;
use crate::types::{
  CreateNodeRequest, Device, DeviceId, Node, NodeId, Pipeline, PopulatedNode, Position,
};

/// Error body returned by every REST endpoint.
#[derive(Debug)]
pub struct ApiError(pub TelemetryError);

impl From<TelemetryError> for ApiError {
  fn from(e: TelemetryError) -> Self {
    Self(e)
  }
}

#[derive(Serialize)]
struct ErrorBody {
  error: String,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      TelemetryError::DeviceNotFound(_)
      | TelemetryError::NodeNotFound(_) => StatusCode::NOT_FOUND,
      TelemetryError::MalformedMessage(_) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      warn!(error = %self.0, "request failed");
    }
    (
      status,
      Json(ErrorBody {
        error: self.0.to_string(),
      }),
    )
      .into_response()
  }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Body of `PUT /api/nodes/{nodeId}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNodeRequest {
  pub position: Position,
}

/// Body of `POST /api/pipelines`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectNodesRequest {
  pub name: String,
  pub source_node_id: NodeId,
  pub target_node_id: NodeId,
}

/// Creates a device and its node. Unlike `CREATE_NODE` over the socket, no producer
/// is started.
#[instrument(level = "trace", skip(engine))]
pub(crate) async fn create_node(
  State(engine): State<Arc<Engine>>,
  Json(request): Json<CreateNodeRequest>,
) -> ApiResult<Node> {
  let node = engine.handler().allocate_node(request, None).await?;
  Ok(Json(node.into_node()))
}

pub(crate) async fn list_nodes(State(engine): State<Arc<Engine>>) -> ApiResult<Vec<PopulatedNode>> {
  let nodes = engine.store().list_nodes().await?;
  let mut populated = Vec::with_capacity(nodes.len());
  for node in nodes {
    match engine.registry().get(&node.device_id).await? {
      Some(device) => populated.push(node.populate(device)),
      None => warn!(node = %node.id, device = %node.device_id, "node without device"),
    }
  }
  Ok(Json(populated))
}

/// Moves a node. Responds `null` when the node does not exist.
#[instrument(level = "trace", skip(engine))]
pub(crate) async fn update_node(
  State(engine): State<Arc<Engine>>,
  Path(node_id): Path<NodeId>,
  Json(request): Json<UpdateNodeRequest>,
) -> ApiResult<Option<Node>> {
  let Some(mut node) = engine.store().get_node(&node_id).await? else {
    return Ok(Json(None));
  };
  node.position = request.position;
  engine.store().save_node(node.clone()).await?;
  Ok(Json(Some(node)))
}

pub(crate) async fn list_pipelines(State(engine): State<Arc<Engine>>) -> ApiResult<Vec<Pipeline>> {
  Ok(Json(engine.store().list_pipelines().await?))
}

/// Connects two existing nodes. Unknown endpoints are rejected with 404.
#[instrument(level = "trace", skip(engine))]
pub(crate) async fn connect_nodes(
  State(engine): State<Arc<Engine>>,
  Json(request): Json<ConnectNodesRequest>,
) -> ApiResult<Pipeline> {
  for node_id in [&request.source_node_id, &request.target_node_id] {
    if engine.store().get_node(node_id).await?.is_none() {
      return Err(ApiError(TelemetryError::NodeNotFound(node_id.clone())));
    }
  }
  let pipeline = store::connect_nodes(
    engine.store().as_ref(),
    &request.name,
    &request.source_node_id,
    &request.target_node_id,
  )
  .await?;
  Ok(Json(pipeline))
}

pub(crate) async fn get_device(
  State(engine): State<Arc<Engine>>,
  Path(device_id): Path<DeviceId>,
) -> ApiResult<Device> {
  engine
    .registry()
    .get(&device_id)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError(TelemetryError::DeviceNotFound(device_id)))
}
