//! Liveness status of a device.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Liveness status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
  Active,
  Inactive,
}

impl fmt::Display for DeviceStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DeviceStatus::Active => write!(f, "active"),
      DeviceStatus::Inactive => write!(f, "inactive"),
    }
  }
}
