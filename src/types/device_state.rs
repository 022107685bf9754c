//! Snapshot produced by one production tick.

use chrono::{DateTime, Utc};

use super::{DeviceId, DevicePatch, DeviceStatus};

/// State snapshot built by a tick before it is written to the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
  pub device_id: DeviceId,
  pub status: DeviceStatus,
  pub last_seen: DateTime<Utc>,
  pub timestamp: DateTime<Utc>,
  pub value: f64,
}

impl DeviceState {
  /// A tick always reports the device as active.
  pub fn active(device_id: DeviceId, value: f64, now: DateTime<Utc>) -> Self {
    Self {
      device_id,
      status: DeviceStatus::Active,
      last_seen: now,
      timestamp: now,
      value,
    }
  }

  pub fn to_patch(&self) -> DevicePatch {
    DevicePatch::status(self.status)
      .with_last_seen(self.last_seen)
      .with_last_value(self.value)
  }
}
