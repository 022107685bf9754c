//! Read-only view over the pipeline topology.
//!
//! Resolves every connection's node ids to their owning devices and folds the result
//! into a [DownstreamMap]. The map is never cached: each query reflects the latest
//! edits in the store.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{instrument, trace};

use crate::error::Result;
use crate::store::GraphStore;
use crate::types::{DeviceId, DownstreamMap, NodeId};

/// Computes device-level adjacency from the pipelines held by a [GraphStore].
pub struct GraphAccessor {
  store: Arc<dyn GraphStore>,
}

impl GraphAccessor {
  pub fn new(store: Arc<dyn GraphStore>) -> Self {
    Self { store }
  }

  /// Builds the one-hop device map from all pipelines' connections.
  ///
  /// Connections whose endpoints do not resolve to a node with a device are skipped.
  #[instrument(level = "trace", skip(self))]
  pub async fn downstream_map(&self) -> Result<DownstreamMap> {
    let pipelines = self.store.list_pipelines().await?;
    let mut resolved: HashMap<NodeId, Option<DeviceId>> = HashMap::new();
    let mut map = DownstreamMap::new();

    for pipeline in &pipelines {
      for connection in &pipeline.connections {
        let from = self.resolve(&mut resolved, &connection.from).await?;
        let to = self.resolve(&mut resolved, &connection.to).await?;
        match (from, to) {
          (Some(from), Some(to)) => {
            map.insert(from, to);
          }
          _ => {
            trace!(
              pipeline = %pipeline.id,
              edge = %connection.id,
              "skipping unresolved connection"
            );
          }
        }
      }
    }
    Ok(map)
  }

  /// Devices directly downstream of `device_id`.
  pub async fn downstream_of(&self, device_id: &DeviceId) -> Result<Vec<DeviceId>> {
    Ok(self.downstream_map().await?.downstream_of(device_id))
  }

  async fn resolve(
    &self,
    cache: &mut HashMap<NodeId, Option<DeviceId>>,
    node_id: &NodeId,
  ) -> Result<Option<DeviceId>> {
    if let Some(hit) = cache.get(node_id) {
      return Ok(hit.clone());
    }
    let device = self
      .store
      .get_node(node_id)
      .await?
      .and_then(|node| node.device().cloned());
    cache.insert(node_id.clone(), device.clone());
    Ok(device)
  }
}
