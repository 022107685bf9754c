//! Pipelines: a named bag of nodes plus the directed connections between them.

use serde::{Deserialize, Serialize};

use super::{EdgeId, NodeId, PipelineId};

/// A directed edge between two nodes, addressable by its own id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
  pub id: EdgeId,
  pub from: NodeId,
  pub to: NodeId,
}

impl Connection {
  pub fn new(from: NodeId, to: NodeId) -> Self {
    Self {
      id: EdgeId::generate(),
      from,
      to,
    }
  }
}

/// A weakly-connected subgraph of nodes and their connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
  pub id: PipelineId,
  pub name: String,
  pub nodes: Vec<NodeId>,
  pub connections: Vec<Connection>,
}

impl Pipeline {
  /// New pipeline holding a single `from -> to` connection.
  pub fn with_edge(name: impl Into<String>, from: NodeId, to: NodeId) -> Self {
    let mut pipeline = Self {
      id: PipelineId::generate(),
      name: name.into(),
      nodes: Vec::new(),
      connections: Vec::new(),
    };
    pipeline.add_edge(from, to);
    pipeline
  }

  pub fn contains_node(&self, node_id: &NodeId) -> bool {
    self.nodes.contains(node_id)
  }

  pub fn contains_edge(&self, edge_id: &EdgeId) -> bool {
    self.connections.iter().any(|c| &c.id == edge_id)
  }

  /// Appends a connection, adding whichever endpoint nodes are not members yet.
  pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> EdgeId {
    if !self.contains_node(&from) {
      self.nodes.push(from.clone());
    }
    if !self.contains_node(&to) {
      self.nodes.push(to.clone());
    }
    let connection = Connection::new(from, to);
    let id = connection.id.clone();
    self.connections.push(connection);
    id
  }

  /// Removes the connection with `edge_id`. Returns whether anything was removed.
  pub fn remove_edge(&mut self, edge_id: &EdgeId) -> bool {
    let before = self.connections.len();
    self.connections.retain(|c| &c.id != edge_id);
    self.connections.len() != before
  }

  /// A pipeline without connections has nothing left to carry.
  pub fn is_empty(&self) -> bool {
    self.connections.is_empty()
  }
}
