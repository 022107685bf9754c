//! Authoritative current state of every known device.
//!
//! All device writes go through [DeviceRegistry::upsert] (or the helpers built on it),
//! which serializes read-modify-write cycles per device id so concurrent ticks,
//! forwards and sweeps never lose an update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::store::GraphStore;
use crate::types::{Device, DeviceId, DevicePatch, DeviceStatus};

/// Device state backed by a [GraphStore], with per-device write serialization.
pub struct DeviceRegistry {
  store: Arc<dyn GraphStore>,
  locks: Mutex<HashMap<DeviceId, Arc<tokio::sync::Mutex<()>>>>,
}

impl DeviceRegistry {
  pub fn new(store: Arc<dyn GraphStore>) -> Self {
    Self {
      store,
      locks: Mutex::new(HashMap::new()),
    }
  }

  fn lock_for(&self, device_id: &DeviceId) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(device_id.clone()).or_default())
  }

  pub async fn get(&self, device_id: &DeviceId) -> Result<Option<Device>> {
    self.store.get_device(device_id).await
  }

  pub async fn list(&self) -> Result<Vec<Device>> {
    self.store.list_devices().await
  }

  /// Creates a brand-new active device under a fresh id.
  #[instrument(level = "trace", skip(self))]
  pub async fn create(&self, name: Option<String>, last_value: Option<f64>) -> Result<Device> {
    let device = Device {
      id: DeviceId::generate(),
      name,
      status: DeviceStatus::Active,
      last_seen: Utc::now(),
      last_value,
    };
    self.store.save_device(device.clone()).await?;
    debug!(device = %device.id, "device created");
    Ok(device)
  }

  /// Applies `patch` to the device, creating it first if it does not exist.
  ///
  /// Only the fields present in the patch change.
  #[instrument(level = "trace", skip(self))]
  pub async fn upsert(&self, device_id: &DeviceId, patch: DevicePatch) -> Result<Device> {
    let lock = self.lock_for(device_id);
    let _guard = lock.lock().await;
    let device = match self.store.get_device(device_id).await? {
      Some(mut existing) => {
        existing.apply(&patch);
        existing
      }
      None => {
        debug!(device = %device_id, "implicitly creating device");
        Device::from_patch(device_id.clone(), &patch, Utc::now())
      }
    };
    self.store.save_device(device.clone()).await?;
    Ok(device)
  }

  /// Demotes the device to inactive.
  ///
  /// Returns the updated device only when this call performed the transition; a device
  /// that is already inactive is left alone and yields `None`. An unknown device is
  /// recorded as inactive.
  pub async fn mark_inactive(&self, device_id: &DeviceId) -> Result<Option<Device>> {
    self.mark_inactive_if(device_id, || true).await
  }

  /// Like [DeviceRegistry::mark_inactive], but only while `still_stale` holds.
  ///
  /// `still_stale` is evaluated under the device lock after the current record has been
  /// read, so a tick or forward that drove the device in the meantime wins.
  #[instrument(level = "trace", skip(self, still_stale))]
  pub async fn mark_inactive_if<F>(
    &self,
    device_id: &DeviceId,
    still_stale: F,
  ) -> Result<Option<Device>>
  where
    F: Fn() -> bool + Send,
  {
    let lock = self.lock_for(device_id);
    let _guard = lock.lock().await;
    let patch = DevicePatch::status(DeviceStatus::Inactive);
    let current = self.store.get_device(device_id).await?;
    if !still_stale() {
      debug!(device = %device_id, "driven during sweep, staying active");
      return Ok(None);
    }
    let device = match current {
      Some(existing) if existing.status == DeviceStatus::Inactive => return Ok(None),
      Some(mut existing) => {
        existing.apply(&patch);
        existing
      }
      None => Device::from_patch(device_id.clone(), &patch, Utc::now()),
    };
    self.store.save_device(device.clone()).await?;
    Ok(Some(device))
  }

  /// Drops the device's write lock when no write is in flight. Returns whether it was
  /// released.
  pub fn release(&self, device_id: &DeviceId) -> bool {
    let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
    match locks.get(device_id) {
      Some(lock) if Arc::strong_count(lock) == 1 => locks.remove(device_id).is_some(),
      _ => false,
    }
  }

  pub fn tracked_locks(&self) -> usize {
    self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}
