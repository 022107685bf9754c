//! Engine timing and server settings.

use std::path::PathBuf;
use std::time::Duration;

/// Default period between two production ticks of one device.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(2);
/// Default period of the liveness sweep.
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(5);
/// Default time without a touch after which a device is demoted to inactive.
pub const DEFAULT_INACTIVITY_THRESHOLD: Duration = Duration::from_secs(5);
/// Generated readings fall in `[0, DEFAULT_MAX_READING)`.
pub const DEFAULT_MAX_READING: f64 = 100.0;

/// Timing of the propagation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
  pub tick_period: Duration,
  pub sweep_period: Duration,
  pub inactivity_threshold: Duration,
  pub max_reading: f64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      tick_period: DEFAULT_TICK_PERIOD,
      sweep_period: DEFAULT_SWEEP_PERIOD,
      inactivity_threshold: DEFAULT_INACTIVITY_THRESHOLD,
      max_reading: DEFAULT_MAX_READING,
    }
  }
}

impl EngineConfig {
  pub fn with_tick_period(mut self, period: Duration) -> Self {
    self.tick_period = period;
    self
  }

  pub fn with_sweep_period(mut self, period: Duration) -> Self {
    self.sweep_period = period;
    self
  }

  pub fn with_inactivity_threshold(mut self, threshold: Duration) -> Self {
    self.inactivity_threshold = threshold;
    self
  }
}

/// Where the server listens and where it keeps its store snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
  /// Loaded at startup when present, written at shutdown.
  pub snapshot_path: Option<PathBuf>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: "0.0.0.0".to_string(),
      port: 4000,
      snapshot_path: None,
    }
  }
}

impl ServerConfig {
  pub fn bind_addr(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}
