//! Propagation scheduler: periodic production ticks and downstream forwarding.
//!
//! Each device is either unscheduled or producing. [PropagationScheduler::start_producing]
//! moves a device to producing once and spawns its tick loop; ticks of one device never
//! overlap because the loop awaits each tick before waiting for the next period.
//!
//! A tick generates a reading, touches liveness, writes an active snapshot to the
//! registry, publishes it, then hands the value to a detached propagation task. Propagation
//! forwards the value to every downstream device concurrently, and from each of those to
//! their own downstream devices, recomputing the topology at every hop. Devices already
//! reached during one propagation pass are not revisited, so cyclic pipelines terminate.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::Result;
use crate::graph_accessor::GraphAccessor;
use crate::liveness::LivenessTracker;
use crate::multiplexer::SubscriptionMultiplexer;
use crate::registry::DeviceRegistry;
use crate::types::{Device, DeviceId, DevicePatch, DeviceState};

/// Source of simulated readings.
pub trait ReadingSource: Send + Sync {
  fn next_reading(&self) -> f64;
}

/// Uniform random readings in `[0, max)`.
#[derive(Debug, Clone, Copy)]
pub struct RandomReadings {
  max: f64,
}

impl RandomReadings {
  pub fn new(max: f64) -> Self {
    Self { max }
  }
}

impl ReadingSource for RandomReadings {
  fn next_reading(&self) -> f64 {
    rand::thread_rng().gen_range(0.0..self.max)
  }
}

/// Always yields the same reading.
#[derive(Debug, Clone, Copy)]
pub struct FixedReading(pub f64);

impl ReadingSource for FixedReading {
  fn next_reading(&self) -> f64 {
    self.0
  }
}

/// Result of one production tick.
#[derive(Debug)]
pub struct TickOutcome {
  /// Device state as written and published by the tick.
  pub device: Device,
  /// Detached propagation of the tick's value; completes when every reachable
  /// downstream device has been forwarded into.
  pub propagation: JoinHandle<()>,
}

/// Owns the per-device production loops and performs ticks and forwards.
pub struct PropagationScheduler {
  registry: Arc<DeviceRegistry>,
  graph: Arc<GraphAccessor>,
  liveness: Arc<LivenessTracker>,
  mux: Arc<SubscriptionMultiplexer>,
  readings: Arc<dyn ReadingSource>,
  tick_period: Duration,
  producers: Mutex<HashMap<DeviceId, JoinHandle<()>>>,
}

type Visited = Arc<Mutex<HashSet<DeviceId>>>;

impl PropagationScheduler {
  pub fn new(
    registry: Arc<DeviceRegistry>,
    graph: Arc<GraphAccessor>,
    liveness: Arc<LivenessTracker>,
    mux: Arc<SubscriptionMultiplexer>,
    readings: Arc<dyn ReadingSource>,
    tick_period: Duration,
  ) -> Self {
    Self {
      registry,
      graph,
      liveness,
      mux,
      readings,
      tick_period,
      producers: Mutex::new(HashMap::new()),
    }
  }

  pub fn next_reading(&self) -> f64 {
    self.readings.next_reading()
  }

  fn producers(&self) -> std::sync::MutexGuard<'_, HashMap<DeviceId, JoinHandle<()>>> {
    self.producers.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn is_producing(&self, device_id: &DeviceId) -> bool {
    self.producers().contains_key(device_id)
  }

  pub fn producing_devices(&self) -> Vec<DeviceId> {
    self.producers().keys().cloned().collect()
  }

  /// Moves the device to producing and spawns its tick loop.
  ///
  /// Idempotent: returns false when the device already has a producer. The device is
  /// touched either way so liveness tracking starts with it.
  pub fn start_producing(self: &Arc<Self>, device_id: &DeviceId) -> bool {
    self.liveness.touch(device_id);
    let mut producers = self.producers();
    if producers.contains_key(device_id) {
      return false;
    }

    let scheduler = Arc::clone(self);
    let id = device_id.clone();
    let period = self.tick_period;
    let handle = tokio::spawn(async move {
      let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        ticker.tick().await;
        if let Err(e) = scheduler.tick(&id).await {
          warn!(device = %id, error = %e, "tick abandoned");
        }
      }
    });
    producers.insert(device_id.clone(), handle);
    info!(device = %device_id, ?period, "device producing");
    true
  }

  /// Stops the device's producer. Returns false if it was not producing.
  pub fn stop_producing(&self, device_id: &DeviceId) -> bool {
    match self.producers().remove(device_id) {
      Some(handle) => {
        handle.abort();
        info!(device = %device_id, "device producer stopped");
        true
      }
      None => false,
    }
  }

  /// Stops the device's producer and drops its liveness entry and idle write lock.
  ///
  /// For devices that are gone for good: a retired device is never swept to inactive.
  /// Returns whether a producer was running.
  pub fn retire(&self, device_id: &DeviceId) -> bool {
    let was_producing = self.stop_producing(device_id);
    self.liveness.forget(device_id);
    self.registry.release(device_id);
    debug!(device = %device_id, "device retired");
    was_producing
  }

  /// Stops every producer.
  pub fn stop_all(&self) -> usize {
    let drained: Vec<_> = self.producers().drain().collect();
    for (_, handle) in &drained {
      handle.abort();
    }
    drained.len()
  }

  /// Runs one production tick for `device_id`.
  #[instrument(level = "trace", skip(self))]
  pub async fn tick(self: &Arc<Self>, device_id: &DeviceId) -> Result<TickOutcome> {
    let value = self.readings.next_reading();
    let state = DeviceState::active(device_id.clone(), value, Utc::now());
    // Touched before the write so a concurrent sweep never sees it stale afterwards.
    self.liveness.touch(device_id);
    let device = self.registry.upsert(device_id, state.to_patch()).await?;
    self.mux.publish(device_id, &device).await?;
    debug!(device = %device_id, value, "tick");

    let scheduler = Arc::clone(self);
    let source = device_id.clone();
    let propagation = tokio::spawn(async move {
      let visited: Visited = Arc::new(Mutex::new(HashSet::from([source.clone()])));
      scheduler.fan_out(source, value, visited).await;
    });
    Ok(TickOutcome {
      device,
      propagation,
    })
  }

  /// Forwards `value` into `device_id` and on through everything downstream of it.
  ///
  /// Unlike a tick this never changes the device's status. Awaits the whole pass.
  #[instrument(level = "trace", skip(self))]
  pub async fn forward(self: &Arc<Self>, device_id: &DeviceId, value: f64) -> Result<Device> {
    let device = self.apply_forward(device_id, value).await?;
    let visited: Visited = Arc::new(Mutex::new(HashSet::from([device_id.clone()])));
    Arc::clone(self)
      .fan_out(device_id.clone(), value, visited)
      .await;
    Ok(device)
  }

  async fn apply_forward(&self, device_id: &DeviceId, value: f64) -> Result<Device> {
    self.liveness.touch(device_id);
    let device = self
      .registry
      .upsert(device_id, DevicePatch::reading(value, Utc::now()))
      .await?;
    self.mux.publish(device_id, &device).await?;
    trace!(device = %device_id, value, "forwarded");
    Ok(device)
  }

  fn fan_out(self: Arc<Self>, from: DeviceId, value: f64, visited: Visited) -> BoxFuture<'static, ()> {
    async move {
      let targets = match self.graph.downstream_of(&from).await {
        Ok(targets) => targets,
        Err(e) => {
          warn!(device = %from, error = %e, "downstream lookup failed");
          return;
        }
      };
      let fresh: Vec<DeviceId> = {
        let mut seen = visited.lock().unwrap_or_else(PoisonError::into_inner);
        targets
          .into_iter()
          .filter(|target| seen.insert(target.clone()))
          .collect()
      };
      let forwards = fresh.into_iter().map(|target| {
        Arc::clone(&self).forward_within(target, value, Arc::clone(&visited))
      });
      join_all(forwards).await;
    }
    .boxed()
  }

  fn forward_within(
    self: Arc<Self>,
    device_id: DeviceId,
    value: f64,
    visited: Visited,
  ) -> BoxFuture<'static, ()> {
    async move {
      match self.apply_forward(&device_id, value).await {
        Ok(_) => self.fan_out(device_id, value, visited).await,
        Err(e) => warn!(device = %device_id, error = %e, "forward abandoned"),
      }
    }
    .boxed()
  }
}
