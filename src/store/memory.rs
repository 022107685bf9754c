//! In-memory [GraphStore] backed by a serializable snapshot.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::GraphStore;
use crate::error::Result;
use crate::types::{Device, DeviceId, EdgeId, Node, NodeId, Pipeline, PipelineId};

/// Full contents of a store. Pipelines keep insertion order so lookups that return
/// "the first match" are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
  #[serde(default)]
  pub devices: BTreeMap<DeviceId, Device>,
  #[serde(default)]
  pub nodes: BTreeMap<NodeId, Node>,
  #[serde(default)]
  pub pipelines: Vec<Pipeline>,
}

/// Store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
  inner: RwLock<StoreSnapshot>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
    Self {
      inner: RwLock::new(snapshot),
    }
  }

  /// Copy of the current contents.
  pub async fn snapshot(&self) -> StoreSnapshot {
    self.inner.read().await.clone()
  }
}

#[async_trait]
impl GraphStore for MemoryStore {
  async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
    Ok(self.inner.read().await.pipelines.clone())
  }

  async fn get_pipeline(&self, id: &PipelineId) -> Result<Option<Pipeline>> {
    let inner = self.inner.read().await;
    Ok(inner.pipelines.iter().find(|p| &p.id == id).cloned())
  }

  async fn find_pipeline_by_edge(&self, edge_id: &EdgeId) -> Result<Option<Pipeline>> {
    let inner = self.inner.read().await;
    Ok(inner.pipelines.iter().find(|p| p.contains_edge(edge_id)).cloned())
  }

  async fn find_pipeline_with_any_node(&self, a: &NodeId, b: &NodeId) -> Result<Option<Pipeline>> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .pipelines
        .iter()
        .find(|p| p.contains_node(a) || p.contains_node(b))
        .cloned(),
    )
  }

  async fn save_pipeline(&self, pipeline: Pipeline) -> Result<()> {
    let mut inner = self.inner.write().await;
    match inner.pipelines.iter_mut().find(|p| p.id == pipeline.id) {
      Some(existing) => *existing = pipeline,
      None => inner.pipelines.push(pipeline),
    }
    Ok(())
  }

  async fn delete_pipeline(&self, id: &PipelineId) -> Result<bool> {
    let mut inner = self.inner.write().await;
    let before = inner.pipelines.len();
    inner.pipelines.retain(|p| &p.id != id);
    Ok(inner.pipelines.len() != before)
  }

  async fn list_nodes(&self) -> Result<Vec<Node>> {
    Ok(self.inner.read().await.nodes.values().cloned().collect())
  }

  async fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
    Ok(self.inner.read().await.nodes.get(id).cloned())
  }

  async fn save_node(&self, node: Node) -> Result<()> {
    self.inner.write().await.nodes.insert(node.id.clone(), node);
    Ok(())
  }

  async fn list_devices(&self) -> Result<Vec<Device>> {
    Ok(self.inner.read().await.devices.values().cloned().collect())
  }

  async fn get_device(&self, id: &DeviceId) -> Result<Option<Device>> {
    Ok(self.inner.read().await.devices.get(id).cloned())
  }

  async fn save_device(&self, device: Device) -> Result<()> {
    self
      .inner
      .write()
      .await
      .devices
      .insert(device.id.clone(), device);
    Ok(())
  }
}
