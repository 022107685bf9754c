//! Tests for `PropagationScheduler`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;

use crate::error::{Result, TelemetryError};
use crate::graph_accessor::GraphAccessor;
use crate::liveness::LivenessTracker;
use crate::multiplexer::{ClientHandle, SubscriptionMultiplexer};
use crate::registry::DeviceRegistry;
use crate::scheduler::{FixedReading, PropagationScheduler, RandomReadings, ReadingSource};
use crate::store::{GraphStore, MemoryStore, connect_nodes};
use crate::types::{
  Device, DeviceId, DevicePatch, DeviceStatus, EdgeId, Node, NodeId, Pipeline, PipelineId,
  Position,
};

/// Memory store whose device reads and writes fail for the ids in `failing`.
#[derive(Default)]
struct FlakyStore {
  inner: MemoryStore,
  failing: Mutex<HashSet<DeviceId>>,
}

impl FlakyStore {
  fn fail(&self, id: &DeviceId) {
    self.failing.lock().unwrap().insert(id.clone());
  }

  fn heal(&self, id: &DeviceId) {
    self.failing.lock().unwrap().remove(id);
  }

  fn check(&self, id: &DeviceId) -> Result<()> {
    if self.failing.lock().unwrap().contains(id) {
      return Err(TelemetryError::Store(format!("device {id} unavailable")));
    }
    Ok(())
  }
}

#[async_trait]
impl GraphStore for FlakyStore {
  async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
    self.inner.list_pipelines().await
  }
  async fn get_pipeline(&self, id: &PipelineId) -> Result<Option<Pipeline>> {
    self.inner.get_pipeline(id).await
  }
  async fn find_pipeline_by_edge(&self, id: &EdgeId) -> Result<Option<Pipeline>> {
    self.inner.find_pipeline_by_edge(id).await
  }
  async fn find_pipeline_with_any_node(&self, a: &NodeId, b: &NodeId) -> Result<Option<Pipeline>> {
    self.inner.find_pipeline_with_any_node(a, b).await
  }
  async fn save_pipeline(&self, pipeline: Pipeline) -> Result<()> {
    self.inner.save_pipeline(pipeline).await
  }
  async fn delete_pipeline(&self, id: &PipelineId) -> Result<bool> {
    self.inner.delete_pipeline(id).await
  }
  async fn list_nodes(&self) -> Result<Vec<Node>> {
    self.inner.list_nodes().await
  }
  async fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
    self.inner.get_node(id).await
  }
  async fn save_node(&self, node: Node) -> Result<()> {
    self.inner.save_node(node).await
  }
  async fn list_devices(&self) -> Result<Vec<Device>> {
    self.inner.list_devices().await
  }
  async fn get_device(&self, id: &DeviceId) -> Result<Option<Device>> {
    self.check(id)?;
    self.inner.get_device(id).await
  }
  async fn save_device(&self, device: Device) -> Result<()> {
    self.check(&device.id)?;
    self.inner.save_device(device).await
  }
}

struct Fixture {
  store: Arc<MemoryStore>,
  registry: Arc<DeviceRegistry>,
  mux: Arc<SubscriptionMultiplexer>,
  liveness: Arc<LivenessTracker>,
  scheduler: Arc<PropagationScheduler>,
}

fn fixture(readings: Arc<dyn ReadingSource>) -> Fixture {
  let store = Arc::new(MemoryStore::new());
  let registry = Arc::new(DeviceRegistry::new(store.clone()));
  let graph = Arc::new(GraphAccessor::new(store.clone()));
  let liveness = Arc::new(LivenessTracker::new(Duration::from_secs(5)));
  let mux = Arc::new(SubscriptionMultiplexer::new());
  let scheduler = Arc::new(PropagationScheduler::new(
    Arc::clone(&registry),
    graph,
    Arc::clone(&liveness),
    Arc::clone(&mux),
    readings,
    Duration::from_secs(2),
  ));
  Fixture {
    store,
    registry,
    mux,
    liveness,
    scheduler,
  }
}

async fn node_for(store: &MemoryStore, device: &str) -> NodeId {
  let node = Node::new(device, Position::default(), DeviceId::new(device));
  let id = node.id.clone();
  store.save_node(node).await.unwrap();
  id
}

async fn device(f: &Fixture, id: &str) -> Device {
  f.registry.get(&DeviceId::new(id)).await.unwrap().unwrap()
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<String>) -> Vec<Device> {
  let mut out = Vec::new();
  while let Ok(text) = rx.try_recv() {
    out.push(serde_json::from_str(&text).unwrap());
  }
  out
}

#[tokio::test]
async fn tick_on_source_device_yields_active_reading_in_range() {
  let f = fixture(Arc::new(RandomReadings::new(100.0)));
  let a = DeviceId::new("A");
  f.registry
    .upsert(&a, DevicePatch::status(DeviceStatus::Inactive))
    .await
    .unwrap();

  let outcome = f.scheduler.tick(&a).await.unwrap();
  outcome.propagation.await.unwrap();

  let d = device(&f, "A").await;
  let v = d.last_value.unwrap();
  assert!((0.0..100.0).contains(&v));
  assert_eq!(d.status, DeviceStatus::Active);
  assert_eq!(outcome.device, d);
  assert!(f.liveness.is_tracked(&a));
}

#[tokio::test]
async fn tick_publishes_to_subscribers() {
  let f = fixture(Arc::new(FixedReading(7.0)));
  let a = DeviceId::new("A");
  let (client, mut rx) = ClientHandle::channel();
  f.mux.subscribe(&a, &client).await;

  f.scheduler.tick(&a).await.unwrap().propagation.await.unwrap();
  let msgs = drain(&mut rx);
  assert_eq!(msgs.len(), 1);
  assert_eq!(msgs[0].id, a);
  assert_eq!(msgs[0].last_value, Some(7.0));
}

#[tokio::test]
async fn tick_reaches_direct_children() {
  let f = fixture(Arc::new(FixedReading(42.0)));
  let a = node_for(&f.store, "A").await;
  let b = node_for(&f.store, "B").await;
  let c = node_for(&f.store, "C").await;
  connect_nodes(f.store.as_ref(), "p", &a, &b).await.unwrap();
  connect_nodes(f.store.as_ref(), "p", &a, &c).await.unwrap();

  let outcome = f.scheduler.tick(&DeviceId::new("A")).await.unwrap();
  outcome.propagation.await.unwrap();

  assert_eq!(device(&f, "B").await.last_value, Some(42.0));
  assert_eq!(device(&f, "C").await.last_value, Some(42.0));
}

#[tokio::test]
async fn chain_propagates_transitively_without_scheduling_downstream() {
  let f = fixture(Arc::new(FixedReading(42.0)));
  let a = node_for(&f.store, "A").await;
  let b = node_for(&f.store, "B").await;
  let c = node_for(&f.store, "C").await;
  connect_nodes(f.store.as_ref(), "p", &a, &b).await.unwrap();
  connect_nodes(f.store.as_ref(), "p", &b, &c).await.unwrap();

  let outcome = f.scheduler.tick(&DeviceId::new("A")).await.unwrap();
  outcome.propagation.await.unwrap();

  assert_eq!(device(&f, "B").await.last_value, Some(42.0));
  assert_eq!(device(&f, "C").await.last_value, Some(42.0));
  assert!(!f.scheduler.is_producing(&DeviceId::new("B")));
  assert!(!f.scheduler.is_producing(&DeviceId::new("C")));
  assert!(f.liveness.is_tracked(&DeviceId::new("C")));
}

#[tokio::test]
async fn forward_leaves_status_untouched() {
  let f = fixture(Arc::new(FixedReading(1.0)));
  let b = DeviceId::new("B");
  f.registry
    .upsert(&b, DevicePatch::status(DeviceStatus::Inactive))
    .await
    .unwrap();

  let d = f.scheduler.forward(&b, 64.0).await.unwrap();
  assert_eq!(d.status, DeviceStatus::Inactive);
  assert_eq!(d.last_value, Some(64.0));
}

#[tokio::test]
async fn forward_creates_unknown_device() {
  let f = fixture(Arc::new(FixedReading(1.0)));
  let d = f.scheduler.forward(&DeviceId::new("fresh"), 3.0).await.unwrap();
  assert_eq!(d.status, DeviceStatus::Active);
  assert_eq!(device(&f, "fresh").await.last_value, Some(3.0));
}

#[tokio::test]
async fn cyclic_pipeline_terminates() {
  let f = fixture(Arc::new(FixedReading(5.0)));
  let a = node_for(&f.store, "A").await;
  let b = node_for(&f.store, "B").await;
  let c = node_for(&f.store, "C").await;
  connect_nodes(f.store.as_ref(), "p", &a, &b).await.unwrap();
  connect_nodes(f.store.as_ref(), "p", &b, &c).await.unwrap();
  connect_nodes(f.store.as_ref(), "p", &c, &b).await.unwrap();
  connect_nodes(f.store.as_ref(), "p", &c, &a).await.unwrap();

  let (client, mut rx) = ClientHandle::channel();
  f.mux.subscribe(&DeviceId::new("B"), &client).await;

  let outcome = f.scheduler.tick(&DeviceId::new("A")).await.unwrap();
  tokio::time::timeout(Duration::from_secs(5), outcome.propagation)
    .await
    .expect("propagation should terminate")
    .unwrap();

  assert_eq!(device(&f, "C").await.last_value, Some(5.0));
  assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn diamond_forwards_into_join_once_per_pass() {
  let f = fixture(Arc::new(FixedReading(9.0)));
  let a = node_for(&f.store, "A").await;
  let b = node_for(&f.store, "B").await;
  let c = node_for(&f.store, "C").await;
  let d = node_for(&f.store, "D").await;
  connect_nodes(f.store.as_ref(), "p", &a, &b).await.unwrap();
  connect_nodes(f.store.as_ref(), "p", &a, &c).await.unwrap();
  connect_nodes(f.store.as_ref(), "p", &b, &d).await.unwrap();
  connect_nodes(f.store.as_ref(), "p", &c, &d).await.unwrap();

  let (client, mut rx) = ClientHandle::channel();
  f.mux.subscribe(&DeviceId::new("D"), &client).await;

  let outcome = f.scheduler.tick(&DeviceId::new("A")).await.unwrap();
  outcome.propagation.await.unwrap();
  let msgs = drain(&mut rx);
  assert_eq!(msgs.len(), 1);
  assert_eq!(msgs[0].last_value, Some(9.0));
}

#[tokio::test(start_paused = true)]
async fn producer_ticks_on_period() {
  let f = fixture(Arc::new(FixedReading(11.0)));
  let x = DeviceId::new("X");
  let (client, mut rx) = ClientHandle::channel();
  f.mux.subscribe(&x, &client).await;

  assert!(f.scheduler.start_producing(&x));
  assert!(!f.scheduler.start_producing(&x));
  assert!(f.scheduler.is_producing(&x));
  assert_eq!(f.scheduler.producing_devices(), vec![x.clone()]);

  tokio::time::sleep(Duration::from_millis(1900)).await;
  assert!(drain(&mut rx).is_empty());

  tokio::time::sleep(Duration::from_millis(200)).await;
  let msgs = drain(&mut rx);
  assert_eq!(msgs.len(), 1);
  assert_eq!(msgs[0].last_value, Some(11.0));
  assert_eq!(device(&f, "X").await.last_value, Some(11.0));

  tokio::time::sleep(Duration::from_secs(2)).await;
  assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stopped_producer_no_longer_ticks() {
  let f = fixture(Arc::new(FixedReading(1.0)));
  let x = DeviceId::new("X");
  let (client, mut rx) = ClientHandle::channel();
  f.mux.subscribe(&x, &client).await;

  f.scheduler.start_producing(&x);
  tokio::time::sleep(Duration::from_millis(2100)).await;
  assert_eq!(drain(&mut rx).len(), 1);

  assert!(f.scheduler.stop_producing(&x));
  assert!(!f.scheduler.stop_producing(&x));
  tokio::time::sleep(Duration::from_secs(10)).await;
  assert!(drain(&mut rx).is_empty());
  assert!(!f.scheduler.is_producing(&x));
}

#[tokio::test(start_paused = true)]
async fn stop_all_stops_every_producer() {
  let f = fixture(Arc::new(FixedReading(1.0)));
  f.scheduler.start_producing(&DeviceId::new("A"));
  f.scheduler.start_producing(&DeviceId::new("B"));
  assert_eq!(f.scheduler.stop_all(), 2);
  assert!(f.scheduler.producing_devices().is_empty());
}

fn flaky_scheduler(
  store: &Arc<FlakyStore>,
  readings: Arc<dyn ReadingSource>,
) -> (Arc<DeviceRegistry>, Arc<SubscriptionMultiplexer>, Arc<PropagationScheduler>) {
  let registry = Arc::new(DeviceRegistry::new(store.clone()));
  let mux = Arc::new(SubscriptionMultiplexer::new());
  let scheduler = Arc::new(PropagationScheduler::new(
    Arc::clone(&registry),
    Arc::new(GraphAccessor::new(store.clone())),
    Arc::new(LivenessTracker::new(Duration::from_secs(5))),
    Arc::clone(&mux),
    readings,
    Duration::from_secs(2),
  ));
  (registry, mux, scheduler)
}

#[tokio::test(start_paused = true)]
async fn failed_tick_is_abandoned_and_producer_keeps_going() {
  let store = Arc::new(FlakyStore::default());
  let (registry, mux, scheduler) = flaky_scheduler(&store, Arc::new(FixedReading(4.0)));
  let x = DeviceId::new("X");
  let (client, mut rx) = ClientHandle::channel();
  mux.subscribe(&x, &client).await;

  store.fail(&x);
  scheduler.start_producing(&x);
  tokio::time::sleep(Duration::from_millis(2100)).await;
  assert!(drain(&mut rx).is_empty());
  assert!(scheduler.is_producing(&x));

  store.heal(&x);
  tokio::time::sleep(Duration::from_secs(2)).await;
  let msgs = drain(&mut rx);
  assert_eq!(msgs.len(), 1);
  assert_eq!(msgs[0].last_value, Some(4.0));
  assert_eq!(registry.get(&x).await.unwrap().unwrap().last_value, Some(4.0));
  scheduler.stop_all();
}

#[tokio::test]
async fn failed_forward_into_one_child_still_reaches_its_sibling() {
  let store = Arc::new(FlakyStore::default());
  let (registry, _, scheduler) = flaky_scheduler(&store, Arc::new(FixedReading(0.0)));
  let a = node_for(&store.inner, "A").await;
  let b = node_for(&store.inner, "B").await;
  let c = node_for(&store.inner, "C").await;
  connect_nodes(store.as_ref(), "p", &a, &b).await.unwrap();
  connect_nodes(store.as_ref(), "p", &a, &c).await.unwrap();

  let broken = DeviceId::new("B");
  store.fail(&broken);
  scheduler.forward(&DeviceId::new("A"), 6.0).await.unwrap();

  let sibling = registry.get(&DeviceId::new("C")).await.unwrap().unwrap();
  assert_eq!(sibling.last_value, Some(6.0));
  store.heal(&broken);
  assert!(registry.get(&broken).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn retire_stops_producer_and_releases_device_state() {
  let f = fixture(Arc::new(FixedReading(1.0)));
  let x = DeviceId::new("X");
  f.scheduler.start_producing(&x);
  tokio::time::sleep(Duration::from_millis(2100)).await;
  assert!(f.liveness.is_tracked(&x));
  assert_eq!(f.registry.tracked_locks(), 1);

  assert!(f.scheduler.retire(&x));
  assert!(!f.scheduler.is_producing(&x));
  assert!(!f.liveness.is_tracked(&x));
  assert_eq!(f.registry.tracked_locks(), 0);
  assert!(!f.scheduler.retire(&x));
}

proptest! {
  #[test]
  fn random_readings_stay_below_max(max in 0.001f64..1000.0) {
    let source = RandomReadings::new(max);
    for _ in 0..32 {
      let v = source.next_reading();
      prop_assert!(v >= 0.0 && v < max);
    }
  }
}
