//! One-hop adjacency between devices, derived from pipeline connections.

use std::collections::{HashMap, HashSet};

use super::DeviceId;

/// Maps a device id to the set of device ids directly downstream of it.
///
/// Derived and ephemeral: rebuilt from the store before every use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownstreamMap {
  edges: HashMap<DeviceId, HashSet<DeviceId>>,
}

impl DownstreamMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records `to` as directly downstream of `from`. Returns false if already known.
  pub fn insert(&mut self, from: DeviceId, to: DeviceId) -> bool {
    self.edges.entry(from).or_default().insert(to)
  }

  /// Direct successors of `device_id`, in no particular order.
  pub fn downstream_of(&self, device_id: &DeviceId) -> Vec<DeviceId> {
    self
      .edges
      .get(device_id)
      .map(|set| set.iter().cloned().collect())
      .unwrap_or_default()
  }

  pub fn contains_edge(&self, from: &DeviceId, to: &DeviceId) -> bool {
    self.edges.get(from).is_some_and(|set| set.contains(to))
  }

  /// Number of distinct device-to-device edges.
  pub fn edge_count(&self) -> usize {
    self.edges.values().map(HashSet::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.edges.is_empty()
  }
}
