//! Control messages exchanged over a client connection.
//!
//! Inbound and outbound messages are JSON objects discriminated by a `type` field.

use serde::{Deserialize, Serialize};

use super::{EdgeId, PopulatedNode, Position};

/// Body of a `CREATE_NODE` request (also accepted by `POST /api/nodes`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeRequest {
  #[serde(default)]
  pub device_name: Option<String>,
  #[serde(default)]
  pub label: Option<String>,
  #[serde(default)]
  pub position: Option<Position>,
}

/// Commands a client may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundMessage {
  CreateNode {
    node: CreateNodeRequest,
  },
  DeleteEdge {
    #[serde(rename = "edgeId")]
    edge_id: EdgeId,
  },
  /// Any `type` this server does not handle. Never produced by serde directly.
  #[serde(skip)]
  Unknown { kind: String },
}

impl InboundMessage {
  const KNOWN: [&'static str; 2] = ["CREATE_NODE", "DELETE_EDGE"];

  /// Parses one inbound text frame.
  ///
  /// Invalid JSON, or a known `type` with a malformed body, is an error. A well-formed
  /// object with an unrecognised (or missing) `type` becomes [InboundMessage::Unknown].
  pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let kind = value
      .get("type")
      .and_then(serde_json::Value::as_str)
      .unwrap_or_default()
      .to_string();
    if Self::KNOWN.contains(&kind.as_str()) {
      serde_json::from_value(value)
    } else {
      Ok(InboundMessage::Unknown { kind })
    }
  }
}

/// Replies sent to the client that issued a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
  NodeCreated {
    node: PopulatedNode,
  },
  EdgeDeleted {
    #[serde(rename = "edgeId")]
    edge_id: EdgeId,
  },
  Error {
    message: String,
  },
}
