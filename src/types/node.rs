//! Graph node: presentation metadata plus the device it owns.

use serde::{Deserialize, Serialize};

use super::{Device, DeviceId, NodeId};

/// Label given to nodes created without one.
pub const DEFAULT_NODE_LABEL: &str = "Unnamed Node";

/// 2-D canvas position. Opaque to the propagation engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

impl Default for Position {
  fn default() -> Self {
    Self { x: 100.0, y: 100.0 }
  }
}

/// A graph vertex owning exactly one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
  pub id: NodeId,
  pub label: String,
  pub position: Position,
  pub device_id: DeviceId,
}

impl Node {
  pub fn new(label: impl Into<String>, position: Position, device_id: DeviceId) -> Self {
    Self {
      id: NodeId::generate(),
      label: label.into(),
      position,
      device_id,
    }
  }

  /// The owning device, or `None` when the node carries no usable device id.
  pub fn device(&self) -> Option<&DeviceId> {
    (!self.device_id.is_empty()).then_some(&self.device_id)
  }

  pub fn populate(self, device: Device) -> PopulatedNode {
    PopulatedNode {
      id: self.id,
      label: self.label,
      position: self.position,
      device,
    }
  }
}

/// A node with its device record inlined under `deviceId`, as clients expect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulatedNode {
  pub id: NodeId,
  pub label: String,
  pub position: Position,
  #[serde(rename = "deviceId")]
  pub device: Device,
}

impl PopulatedNode {
  pub fn into_node(self) -> Node {
    Node {
      id: self.id,
      label: self.label,
      position: self.position,
      device_id: self.device.id,
    }
  }
}
