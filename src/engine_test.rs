//! Tests for `Engine`.

use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::multiplexer::ClientHandle;
use crate::scheduler::FixedReading;
use crate::store::MemoryStore;
use crate::types::{CreateNodeRequest, Device, DeviceStatus};

fn engine() -> Engine {
  Engine::with_readings(
    Arc::new(MemoryStore::new()),
    EngineConfig::default(),
    Arc::new(FixedReading(30.0)),
  )
}

#[tokio::test]
async fn start_is_idempotent_and_shutdown_stops() {
  let e = engine();
  assert!(!e.is_running());
  assert!(e.start());
  assert!(!e.start());
  assert!(e.is_running());
  e.shutdown();
  assert!(!e.is_running());
}

#[tokio::test(start_paused = true)]
async fn driven_device_goes_inactive_after_its_producer_stops() {
  let e = engine();
  e.start();
  let (client, mut rx) = ClientHandle::channel();
  let node = e
    .handler()
    .create_node(&client, CreateNodeRequest::default())
    .await
    .unwrap();
  let id = node.device.id.clone();

  tokio::time::sleep(Duration::from_secs(12)).await;
  assert!(e.registry().get(&id).await.unwrap().unwrap().is_active());

  e.scheduler().stop_producing(&id);
  while rx.try_recv().is_ok() {}
  tokio::time::sleep(Duration::from_secs(11)).await;

  let stored = e.registry().get(&id).await.unwrap().unwrap();
  assert_eq!(stored.status, DeviceStatus::Inactive);
  assert_eq!(stored.last_value, Some(30.0));

  let mut inactive = 0;
  while let Ok(text) = rx.try_recv() {
    let d: Device = serde_json::from_str(&text).unwrap();
    if d.status == DeviceStatus::Inactive {
      inactive += 1;
    }
  }
  assert_eq!(inactive, 1);
  e.shutdown();
}
