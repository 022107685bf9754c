//! Device record and the partial updates applied to it.
//!
//! A [Device] is the outbound broadcast payload: it is serialized as-is (camelCase)
//! to every subscriber whenever it changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeviceId, DeviceStatus};

/// Current state of one simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
  pub id: DeviceId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  pub status: DeviceStatus,
  pub last_seen: DateTime<Utc>,
  #[serde(default)]
  pub last_value: Option<f64>,
}

impl Device {
  /// Builds a device that does not exist yet from the first patch applied to it.
  ///
  /// Fields missing from the patch take their creation defaults: active, seen `now`,
  /// no reading.
  pub fn from_patch(id: DeviceId, patch: &DevicePatch, now: DateTime<Utc>) -> Self {
    Self {
      id,
      name: patch.name.clone(),
      status: patch.status.unwrap_or(DeviceStatus::Active),
      last_seen: patch.last_seen.unwrap_or(now),
      last_value: patch.last_value,
    }
  }

  /// Applies only the fields present in `patch`.
  pub fn apply(&mut self, patch: &DevicePatch) {
    if let Some(ref name) = patch.name {
      self.name = Some(name.clone());
    }
    if let Some(status) = patch.status {
      self.status = status;
    }
    if let Some(last_seen) = patch.last_seen {
      self.last_seen = last_seen;
    }
    if let Some(value) = patch.last_value {
      self.last_value = Some(value);
    }
  }

  pub fn is_active(&self) -> bool {
    self.status == DeviceStatus::Active
  }
}

/// Partial update for a [Device]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevicePatch {
  pub name: Option<String>,
  pub status: Option<DeviceStatus>,
  pub last_seen: Option<DateTime<Utc>>,
  pub last_value: Option<f64>,
}

impl DevicePatch {
  pub fn status(status: DeviceStatus) -> Self {
    Self {
      status: Some(status),
      ..Self::default()
    }
  }

  /// Patch applied when a value is forwarded into a device: seen now, new reading,
  /// status untouched.
  pub fn reading(value: f64, at: DateTime<Utc>) -> Self {
    Self {
      last_seen: Some(at),
      last_value: Some(value),
      ..Self::default()
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_status(mut self, status: DeviceStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn with_last_seen(mut self, at: DateTime<Utc>) -> Self {
    self.last_seen = Some(at);
    self
  }

  pub fn with_last_value(mut self, value: f64) -> Self {
    self.last_value = Some(value);
    self
  }

  pub fn is_empty(&self) -> bool {
    self == &Self::default()
  }
}
