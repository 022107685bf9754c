//! Pipeline edits expressed on top of [GraphStore].

use tracing::{debug, instrument};

use super::GraphStore;
use crate::error::Result;
use crate::types::{EdgeId, NodeId, Pipeline, PipelineId};

/// What happened to the pipeline that held a removed edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeRemoval {
  /// The pipeline still has connections and was saved without the edge.
  PipelineUpdated(PipelineId),
  /// The edge was the pipeline's last connection; the pipeline is gone.
  PipelineDeleted(PipelineId),
  /// No pipeline holds this edge.
  NotFound,
}

/// Adds a `source -> target` connection.
///
/// Merge-on-overlap: the edge joins the first pipeline that already contains either
/// endpoint (missing endpoints are added to its node set). Otherwise a new pipeline
/// named `name` is created.
#[instrument(level = "trace", skip(store))]
pub async fn connect_nodes(
  store: &dyn GraphStore,
  name: &str,
  source: &NodeId,
  target: &NodeId,
) -> Result<Pipeline> {
  let pipeline = match store.find_pipeline_with_any_node(source, target).await? {
    Some(mut existing) => {
      existing.add_edge(source.clone(), target.clone());
      debug!(pipeline = %existing.id, "merged edge into existing pipeline");
      existing
    }
    None => {
      let created = Pipeline::with_edge(name, source.clone(), target.clone());
      debug!(pipeline = %created.id, "created pipeline");
      created
    }
  };
  store.save_pipeline(pipeline.clone()).await?;
  Ok(pipeline)
}

/// Removes one connection; deletes its pipeline when no connection is left.
#[instrument(level = "trace", skip(store))]
pub async fn remove_edge(store: &dyn GraphStore, edge_id: &EdgeId) -> Result<EdgeRemoval> {
  let Some(mut pipeline) = store.find_pipeline_by_edge(edge_id).await? else {
    return Ok(EdgeRemoval::NotFound);
  };
  pipeline.remove_edge(edge_id);
  if pipeline.is_empty() {
    store.delete_pipeline(&pipeline.id).await?;
    Ok(EdgeRemoval::PipelineDeleted(pipeline.id))
  } else {
    let id = pipeline.id.clone();
    store.save_pipeline(pipeline).await?;
    Ok(EdgeRemoval::PipelineUpdated(id))
  }
}
