//! Error types for the telemetry engine.

use thiserror::Error;

use crate::types::{ConnectionId, DeviceId, NodeId};

/// Errors raised by the store, the engine components and the transport glue.
///
/// None of these is fatal to the process: ticks and forwards that fail are logged and
/// abandoned for that cycle.
#[derive(Error, Debug)]
pub enum TelemetryError {
  #[error("store error: {0}")]
  Store(String),

  #[error("device not found: {0}")]
  DeviceNotFound(DeviceId),

  #[error("node not found: {0}")]
  NodeNotFound(NodeId),

  #[error("malformed message: {0}")]
  MalformedMessage(#[from] serde_json::Error),

  #[error("subscriber {0} is closed")]
  SubscriberClosed(ConnectionId),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
