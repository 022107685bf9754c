//! Tests for snapshot save/load.

use chrono::Utc;

use super::StoreSnapshot;
use super::snapshot_io::{
  SNAPSHOT_FILENAME, load_snapshot, load_snapshot_if_present, save_snapshot, snapshot_file,
};
use crate::types::{Device, DeviceId, DeviceStatus, Node, NodeId, Pipeline, Position};

#[test]
fn roundtrip_save_load() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("nested").join(SNAPSHOT_FILENAME);
  let mut snapshot = StoreSnapshot::default();
  snapshot.devices.insert(
    DeviceId::new("d1"),
    Device {
      id: DeviceId::new("d1"),
      name: Some("pump".to_string()),
      status: DeviceStatus::Inactive,
      last_seen: Utc::now(),
      last_value: Some(1.5),
    },
  );
  let node = Node::new("Pump", Position::default(), DeviceId::new("d1"));
  snapshot.nodes.insert(node.id.clone(), node);
  snapshot
    .pipelines
    .push(Pipeline::with_edge("p", NodeId::new("a"), NodeId::new("b")));

  save_snapshot(&path, &snapshot).unwrap();
  assert!(path.exists());
  let loaded = load_snapshot(&path).unwrap();
  assert_eq!(loaded, snapshot);
}

#[test]
fn load_missing_file_returns_error() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("nonexistent.json");
  assert!(load_snapshot(&path).is_err());
}

#[test]
fn load_invalid_json_is_invalid_data() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join(SNAPSHOT_FILENAME);
  std::fs::write(&path, "{ nope").unwrap();
  let err = load_snapshot(&path).unwrap_err();
  assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn directory_location_resolves_to_default_file() {
  let dir = tempfile::tempdir().unwrap();
  assert_eq!(snapshot_file(dir.path()), dir.path().join(SNAPSHOT_FILENAME));
  let explicit = dir.path().join("custom.json");
  assert_eq!(snapshot_file(&explicit), explicit);
}

#[test]
fn missing_file_is_none_when_optional() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join(SNAPSHOT_FILENAME);
  assert!(load_snapshot_if_present(&path).unwrap().is_none());

  save_snapshot(&path, &StoreSnapshot::default()).unwrap();
  assert_eq!(
    load_snapshot_if_present(&path).unwrap(),
    Some(StoreSnapshot::default())
  );
}

#[test]
fn save_replaces_previous_snapshot_without_leftovers() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join(SNAPSHOT_FILENAME);
  std::fs::write(&path, "stale").unwrap();
  save_snapshot(&path, &StoreSnapshot::default()).unwrap();
  assert_eq!(load_snapshot(&path).unwrap(), StoreSnapshot::default());
  let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
  assert_eq!(entries.len(), 1);
}
