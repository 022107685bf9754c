//! Per-device "last driven" instants and the inactivity sweep.
//!
//! Every tick or forward touches the device it drove. One sweeper task walks all
//! tracked devices on a fixed period and demotes those untouched for longer than the
//! inactivity threshold, publishing each active-to-inactive transition exactly once.
//! A device enters tracking the first time it is touched and leaves it only through
//! [LivenessTracker::forget].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::multiplexer::SubscriptionMultiplexer;
use crate::registry::DeviceRegistry;
use crate::types::DeviceId;

/// Last-touched instants for every device driven so far.
pub struct LivenessTracker {
  last_touched: Mutex<HashMap<DeviceId, Instant>>,
  threshold: Duration,
}

impl LivenessTracker {
  pub fn new(threshold: Duration) -> Self {
    Self {
      last_touched: Mutex::new(HashMap::new()),
      threshold,
    }
  }

  pub fn threshold(&self) -> Duration {
    self.threshold
  }

  /// Records now as the device's last-driven instant.
  pub fn touch(&self, device_id: &DeviceId) {
    self
      .last_touched
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(device_id.clone(), Instant::now());
  }

  pub fn last_touched(&self, device_id: &DeviceId) -> Option<Instant> {
    self
      .last_touched
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(device_id)
      .copied()
  }

  pub fn is_tracked(&self, device_id: &DeviceId) -> bool {
    self.last_touched(device_id).is_some()
  }

  /// Whether the device's last touch is strictly more than the threshold before `now`.
  /// Untracked devices are never stale.
  pub fn is_stale(&self, device_id: &DeviceId, now: Instant) -> bool {
    self
      .last_touched(device_id)
      .is_some_and(|touched| now.saturating_duration_since(touched) > self.threshold)
  }

  /// Stops tracking the device. Returns whether it was tracked.
  pub fn forget(&self, device_id: &DeviceId) -> bool {
    self
      .last_touched
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(device_id)
      .is_some()
  }

  /// Devices whose last touch is strictly more than the threshold before `now`.
  pub fn stale_at(&self, now: Instant) -> Vec<DeviceId> {
    self
      .last_touched
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .filter(|(_, touched)| now.saturating_duration_since(**touched) > self.threshold)
      .map(|(id, _)| id.clone())
      .collect()
  }

  /// One sweep pass: demote every stale device and publish each transition.
  ///
  /// The stale list is only a candidate set; staleness is confirmed again under the
  /// device's registry lock, so a device driven while the pass is running stays active.
  ///
  /// Returns the number of devices that went inactive in this pass.
  #[instrument(level = "trace", skip_all)]
  pub async fn sweep(&self, registry: &DeviceRegistry, mux: &SubscriptionMultiplexer) -> usize {
    let mut transitions = 0;
    for device_id in self.stale_at(Instant::now()) {
      let still_stale = || self.is_stale(&device_id, Instant::now());
      match registry.mark_inactive_if(&device_id, still_stale).await {
        Ok(Some(device)) => {
          transitions += 1;
          debug!(device = %device_id, "device went inactive");
          if let Err(e) = mux.publish(&device_id, &device).await {
            warn!(device = %device_id, error = %e, "failed to publish inactivity");
          }
        }
        Ok(None) => {}
        Err(e) => warn!(device = %device_id, error = %e, "inactivity sweep failed"),
      }
    }
    transitions
  }

  /// Runs [LivenessTracker::sweep] every `period`, first after one full period.
  pub fn spawn_sweeper(
    self: Arc<Self>,
    registry: Arc<DeviceRegistry>,
    mux: Arc<SubscriptionMultiplexer>,
    period: Duration,
  ) -> JoinHandle<()> {
    info!(?period, threshold = ?self.threshold, "starting liveness sweeper");
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        ticker.tick().await;
        self.sweep(&registry, &mux).await;
      }
    })
  }
}
