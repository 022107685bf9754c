//! Control-message handling for client connections.
//!
//! Connect enrolls the client for every known device and makes sure each one is
//! producing. Inbound `CREATE_NODE` allocates a driven device and its node;
//! `DELETE_EDGE` removes one pipeline connection. Replies go to the sender only.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::multiplexer::{ClientHandle, SubscriptionMultiplexer};
use crate::registry::DeviceRegistry;
use crate::scheduler::PropagationScheduler;
use crate::store::{EdgeRemoval, GraphStore, remove_edge};
use crate::types::{
  CreateNodeRequest, DEFAULT_NODE_LABEL, EdgeId, InboundMessage, Node, OutboundMessage,
  PopulatedNode,
};

/// Reply text sent when node creation fails.
pub const CREATE_NODE_FAILED: &str = "Failed to create node";

/// Applies client commands to the store, registry, subscriptions and scheduler.
pub struct ControlHandler {
  store: Arc<dyn GraphStore>,
  registry: Arc<DeviceRegistry>,
  mux: Arc<SubscriptionMultiplexer>,
  scheduler: Arc<PropagationScheduler>,
}

impl ControlHandler {
  pub fn new(
    store: Arc<dyn GraphStore>,
    registry: Arc<DeviceRegistry>,
    mux: Arc<SubscriptionMultiplexer>,
    scheduler: Arc<PropagationScheduler>,
  ) -> Self {
    Self {
      store,
      registry,
      mux,
      scheduler,
    }
  }

  /// Subscribes a new connection to every known device and starts their producers.
  ///
  /// Returns the number of devices the client was enrolled for.
  #[instrument(level = "trace", skip_all, fields(connection = %client.id()))]
  pub async fn on_connect(&self, client: &ClientHandle) -> Result<usize> {
    let devices = self.registry.list().await?;
    if devices.is_empty() {
      warn!("no devices found");
    }
    for device in &devices {
      self.mux.subscribe(&device.id, client).await;
      self.scheduler.start_producing(&device.id);
    }
    info!(connection = %client.id(), devices = devices.len(), "client connected");
    Ok(devices.len())
  }

  /// Drops every subscription the connection held.
  pub async fn on_disconnect(&self, client: &ClientHandle) -> usize {
    let removed = self.mux.unsubscribe_all(client.id()).await;
    info!(connection = %client.id(), subscriptions = removed, "client disconnected");
    removed
  }

  /// Handles one inbound text frame.
  ///
  /// Malformed JSON is returned as an error for the caller to log; the connection
  /// stays usable. Unknown message types are logged and ignored.
  #[instrument(level = "trace", skip_all, fields(connection = %client.id()))]
  pub async fn handle_text(&self, client: &ClientHandle, text: &str) -> Result<()> {
    match InboundMessage::parse(text)? {
      InboundMessage::CreateNode { node } => {
        info!(request = ?node, "creating new node");
        self.create_node(client, node).await.map(|_| ())
      }
      InboundMessage::DeleteEdge { edge_id } => {
        info!(edge = %edge_id, "deleting edge");
        self.delete_edge(client, &edge_id).await.map(|_| ())
      }
      InboundMessage::Unknown { kind } => {
        info!(kind = %kind, "unknown message type");
        Ok(())
      }
    }
  }

  /// Creates a device and its node without starting a producer.
  pub async fn allocate_node(
    &self,
    request: CreateNodeRequest,
    initial_value: Option<f64>,
  ) -> Result<PopulatedNode> {
    let device = self
      .registry
      .create(request.device_name, initial_value)
      .await?;
    let node = Node::new(
      request
        .label
        .unwrap_or_else(|| DEFAULT_NODE_LABEL.to_string()),
      request.position.unwrap_or_default(),
      device.id.clone(),
    );
    self.store.save_node(node.clone()).await?;
    Ok(node.populate(device))
  }

  /// Creates a driven device: allocates it, acknowledges to `client`, subscribes
  /// `client` to it and starts its producer.
  ///
  /// On failure the client receives an `ERROR` reply and the error is returned.
  pub async fn create_node(
    &self,
    client: &ClientHandle,
    request: CreateNodeRequest,
  ) -> Result<PopulatedNode> {
    let initial = self.scheduler.next_reading();
    let node = match self.allocate_node(request, Some(initial)).await {
      Ok(node) => node,
      Err(e) => {
        warn!(error = %e, "error creating new node");
        if let Err(send_err) = client.send_json(&OutboundMessage::Error {
          message: CREATE_NODE_FAILED.to_string(),
        }) {
          warn!(error = %send_err, "could not report node creation failure");
        }
        return Err(e);
      }
    };

    client.send_json(&OutboundMessage::NodeCreated { node: node.clone() })?;
    self.mux.subscribe(&node.device.id, client).await;
    self.scheduler.start_producing(&node.device.id);
    Ok(node)
  }

  /// Removes the connection `edge_id` from its pipeline and acknowledges to `client`.
  ///
  /// The acknowledgement is sent even when no pipeline held the edge.
  pub async fn delete_edge(&self, client: &ClientHandle, edge_id: &EdgeId) -> Result<EdgeRemoval> {
    let removal = remove_edge(self.store.as_ref(), edge_id).await?;
    info!(edge = %edge_id, result = ?removal, "edge deleted");
    client.send_json(&OutboundMessage::EdgeDeleted {
      edge_id: edge_id.clone(),
    })?;
    Ok(removal)
  }
}
