//! Identifier newtypes for devices, nodes, edges, pipelines and client connections.
//!
//! Store-backed ids are opaque strings (uuid v4 when minted here, anything when loaded
//! from a snapshot). Connection ids only live for the lifetime of a socket.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct $name(String);

    impl $name {
      pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
      }

      /// Mints a fresh random id.
      pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
      }

      pub fn as_str(&self) -> &str {
        &self.0
      }

      pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
      }
    }

    impl From<&str> for $name {
      fn from(id: &str) -> Self {
        Self(id.to_string())
      }
    }

    impl From<String> for $name {
      fn from(id: String) -> Self {
        Self(id)
      }
    }
  };
}

string_id!(
  /// Identity of a simulated device.
  DeviceId
);
string_id!(
  /// Identity of a graph node.
  NodeId
);
string_id!(
  /// Identity of a single connection inside a pipeline.
  EdgeId
);
string_id!(
  /// Identity of a pipeline.
  PipelineId
);

/// Identity of one client connection (one WebSocket session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
  pub fn generate() -> Self {
    Self(Uuid::new_v4())
  }
}

impl fmt::Display for ConnectionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}
