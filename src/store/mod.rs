//! Graph/device store: the persistence collaborator behind the engine.
//!
//! The engine only talks to [GraphStore]. [MemoryStore] is the bundled implementation;
//! its contents can be written to and read from a JSON snapshot with [snapshot_io].

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Device, DeviceId, EdgeId, Node, NodeId, Pipeline, PipelineId};

mod edit;
mod memory;
pub mod snapshot_io;
#[cfg(test)]
mod snapshot_io_test;

pub use edit::{EdgeRemoval, connect_nodes, remove_edge};
pub use memory::{MemoryStore, StoreSnapshot};

/// CRUD access to pipelines, nodes and devices.
///
/// Every call may suspend on I/O. Implementations must be safe to share between tasks.
#[async_trait]
pub trait GraphStore: Send + Sync {
  async fn list_pipelines(&self) -> Result<Vec<Pipeline>>;

  async fn get_pipeline(&self, id: &PipelineId) -> Result<Option<Pipeline>>;

  /// The pipeline holding the connection `edge_id`, if any.
  async fn find_pipeline_by_edge(&self, edge_id: &EdgeId) -> Result<Option<Pipeline>>;

  /// The first pipeline whose node set contains `a` or `b`.
  async fn find_pipeline_with_any_node(&self, a: &NodeId, b: &NodeId) -> Result<Option<Pipeline>>;

  /// Inserts or replaces the pipeline with the same id.
  async fn save_pipeline(&self, pipeline: Pipeline) -> Result<()>;

  /// Returns whether a pipeline was removed.
  async fn delete_pipeline(&self, id: &PipelineId) -> Result<bool>;

  async fn list_nodes(&self) -> Result<Vec<Node>>;

  async fn get_node(&self, id: &NodeId) -> Result<Option<Node>>;

  async fn save_node(&self, node: Node) -> Result<()>;

  async fn list_devices(&self) -> Result<Vec<Device>>;

  async fn get_device(&self, id: &DeviceId) -> Result<Option<Device>>;

  async fn save_device(&self, device: Device) -> Result<()>;
}
