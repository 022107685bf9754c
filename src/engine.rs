//! Engine: owns and wires every propagation component.
//!
//! One [Engine] per process. [Engine::start] launches the liveness sweeper;
//! [Engine::shutdown] stops it together with every device producer.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::EngineConfig;
use crate::graph_accessor::GraphAccessor;
use crate::handler::ControlHandler;
use crate::liveness::LivenessTracker;
use crate::multiplexer::SubscriptionMultiplexer;
use crate::registry::DeviceRegistry;
use crate::scheduler::{PropagationScheduler, RandomReadings, ReadingSource};
use crate::store::GraphStore;

/// The propagation engine and its shared state.
pub struct Engine {
  config: EngineConfig,
  store: Arc<dyn GraphStore>,
  registry: Arc<DeviceRegistry>,
  graph: Arc<GraphAccessor>,
  liveness: Arc<LivenessTracker>,
  mux: Arc<SubscriptionMultiplexer>,
  scheduler: Arc<PropagationScheduler>,
  handler: ControlHandler,
  sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
  /// Engine producing uniform random readings below `config.max_reading`.
  pub fn new(store: Arc<dyn GraphStore>, config: EngineConfig) -> Self {
    let readings = Arc::new(RandomReadings::new(config.max_reading));
    Self::with_readings(store, config, readings)
  }

  pub fn with_readings(
    store: Arc<dyn GraphStore>,
    config: EngineConfig,
    readings: Arc<dyn ReadingSource>,
  ) -> Self {
    let registry = Arc::new(DeviceRegistry::new(Arc::clone(&store)));
    let graph = Arc::new(GraphAccessor::new(Arc::clone(&store)));
    let liveness = Arc::new(LivenessTracker::new(config.inactivity_threshold));
    let mux = Arc::new(SubscriptionMultiplexer::new());
    let scheduler = Arc::new(PropagationScheduler::new(
      Arc::clone(&registry),
      Arc::clone(&graph),
      Arc::clone(&liveness),
      Arc::clone(&mux),
      readings,
      config.tick_period,
    ));
    let handler = ControlHandler::new(
      Arc::clone(&store),
      Arc::clone(&registry),
      Arc::clone(&mux),
      Arc::clone(&scheduler),
    );
    Self {
      config,
      store,
      registry,
      graph,
      liveness,
      mux,
      scheduler,
      handler,
      sweeper: Mutex::new(None),
    }
  }

  /// Starts the liveness sweeper. Returns false if it is already running.
  pub fn start(&self) -> bool {
    let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
    if sweeper.is_some() {
      return false;
    }
    *sweeper = Some(Arc::clone(&self.liveness).spawn_sweeper(
      Arc::clone(&self.registry),
      Arc::clone(&self.mux),
      self.config.sweep_period,
    ));
    info!("engine started");
    true
  }

  /// Stops the sweeper and every producer.
  pub fn shutdown(&self) {
    if let Some(handle) = self
      .sweeper
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take()
    {
      handle.abort();
    }
    let stopped = self.scheduler.stop_all();
    info!(producers = stopped, "engine stopped");
  }

  pub fn is_running(&self) -> bool {
    self
      .sweeper
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .is_some()
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn store(&self) -> &Arc<dyn GraphStore> {
    &self.store
  }

  pub fn registry(&self) -> &Arc<DeviceRegistry> {
    &self.registry
  }

  pub fn graph(&self) -> &Arc<GraphAccessor> {
    &self.graph
  }

  pub fn liveness(&self) -> &Arc<LivenessTracker> {
    &self.liveness
  }

  pub fn multiplexer(&self) -> &Arc<SubscriptionMultiplexer> {
    &self.mux
  }

  pub fn scheduler(&self) -> &Arc<PropagationScheduler> {
    &self.scheduler
  }

  pub fn handler(&self) -> &ControlHandler {
    &self.handler
  }
}
