//! Many-to-many subscriptions between client connections and device ids.
//!
//! A [ClientHandle] is the transport-facing half of a connection: text pushed into it
//! is written to the socket by the session task. Publishing serializes the payload once
//! and fans it out to every open subscriber of the device; a subscriber whose channel
//! is closed is dropped without affecting the others.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, instrument, warn};

use crate::error::{Result, TelemetryError};
use crate::types::{ConnectionId, DeviceId};

/// Sending half of one client connection.
#[derive(Debug, Clone)]
pub struct ClientHandle {
  id: ConnectionId,
  tx: mpsc::UnboundedSender<String>,
}

impl ClientHandle {
  pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
    Self {
      id: ConnectionId::generate(),
      tx,
    }
  }

  /// A handle plus the receiver the transport drains.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self::new(tx), rx)
  }

  pub fn id(&self) -> ConnectionId {
    self.id
  }

  pub fn is_open(&self) -> bool {
    !self.tx.is_closed()
  }

  pub fn send_text(&self, text: String) -> Result<()> {
    self
      .tx
      .send(text)
      .map_err(|_| TelemetryError::SubscriberClosed(self.id))
  }

  pub fn send_json<T: Serialize>(&self, message: &T) -> Result<()> {
    self.send_text(serde_json::to_string(message)?)
  }
}

/// Tracks which connections want updates for which devices.
#[derive(Debug, Default)]
pub struct SubscriptionMultiplexer {
  subscribers: RwLock<HashMap<DeviceId, HashMap<ConnectionId, ClientHandle>>>,
}

impl SubscriptionMultiplexer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Enrolls `client` for `device_id`. Subscribing twice is a no-op; returns whether
  /// the subscription is new.
  pub async fn subscribe(&self, device_id: &DeviceId, client: &ClientHandle) -> bool {
    let mut subscribers = self.subscribers.write().await;
    let set = subscribers.entry(device_id.clone()).or_default();
    if set.contains_key(&client.id()) {
      return false;
    }
    set.insert(client.id(), client.clone());
    true
  }

  pub async fn unsubscribe(&self, device_id: &DeviceId, connection: ConnectionId) -> bool {
    let mut subscribers = self.subscribers.write().await;
    let Some(set) = subscribers.get_mut(device_id) else {
      return false;
    };
    let removed = set.remove(&connection).is_some();
    if set.is_empty() {
      subscribers.remove(device_id);
    }
    removed
  }

  /// Drops `connection` from every device. Returns how many subscriptions it held.
  pub async fn unsubscribe_all(&self, connection: ConnectionId) -> usize {
    let mut subscribers = self.subscribers.write().await;
    let mut removed = 0;
    subscribers.retain(|_, set| {
      if set.remove(&connection).is_some() {
        removed += 1;
      }
      !set.is_empty()
    });
    removed
  }

  pub async fn subscriber_count(&self, device_id: &DeviceId) -> usize {
    self
      .subscribers
      .read()
      .await
      .get(device_id)
      .map_or(0, HashMap::len)
  }

  /// Sends `payload` to every open subscriber of `device_id`.
  ///
  /// Returns the number of deliveries. Fails only if the payload cannot be serialized.
  #[instrument(level = "trace", skip(self, payload))]
  pub async fn publish<T: Serialize>(&self, device_id: &DeviceId, payload: &T) -> Result<usize> {
    let text = serde_json::to_string(payload)?;
    let mut subscribers = self.subscribers.write().await;
    let Some(set) = subscribers.get_mut(device_id) else {
      return Ok(0);
    };

    let mut delivered = 0;
    set.retain(|connection, client| match client.send_text(text.clone()) {
      Ok(()) => {
        delivered += 1;
        true
      }
      Err(e) => {
        warn!(device = %device_id, connection = %connection, error = %e, "dropping subscriber");
        false
      }
    });
    if set.is_empty() {
      subscribers.remove(device_id);
    }
    debug!(device = %device_id, delivered, "published");
    Ok(delivered)
  }
}
