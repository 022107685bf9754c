//! # streamweave-telemetry
//!
//! Simulated device telemetry propagated in real time along user-defined pipeline graphs.
//!
//! ## Architecture
//!
//! A [PropagationScheduler] ticks every producing device on its own period, records the
//! reading through the [DeviceRegistry], broadcasts it through the
//! [SubscriptionMultiplexer] and forwards it along the pipeline edges resolved by the
//! [GraphAccessor]. A single [LivenessTracker] sweep demotes devices that stopped
//! receiving readings. The [ControlHandler] turns WebSocket control messages into graph
//! edits; [server] exposes it together with a small REST API.
//!
//! [Engine] wires all of the above around one [GraphStore].

pub mod config;
pub mod engine;
#[cfg(test)]
mod engine_test;
pub mod error;
pub mod graph_accessor;
pub mod handler;
pub mod liveness;
pub mod multiplexer;
pub mod registry;
pub mod scheduler;
#[cfg(test)]
mod scheduler_test;
pub mod server;
pub mod store;
pub mod types;

pub use config::{EngineConfig, ServerConfig};
pub use engine::Engine;
pub use error::{Result, TelemetryError};
pub use graph_accessor::GraphAccessor;
pub use handler::ControlHandler;
pub use liveness::LivenessTracker;
pub use multiplexer::{ClientHandle, SubscriptionMultiplexer};
pub use registry::DeviceRegistry;
pub use scheduler::{FixedReading, PropagationScheduler, RandomReadings, ReadingSource, TickOutcome};
pub use store::{GraphStore, MemoryStore, StoreSnapshot};
pub use types::*;
