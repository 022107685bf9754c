//! Plain data types for devices, nodes, pipelines and control messages.
//!
//! Everything here is owned data with serde support; the engine components in the
//! crate root hold the shared, mutable state.

mod device;
mod device_state;
mod device_status;
mod downstream_map;
mod ids;
mod message;
mod node;
mod pipeline;

pub use device::{Device, DevicePatch};
pub use device_state::DeviceState;
pub use device_status::DeviceStatus;
pub use downstream_map::DownstreamMap;
pub use ids::{ConnectionId, DeviceId, EdgeId, NodeId, PipelineId};
pub use message::{CreateNodeRequest, InboundMessage, OutboundMessage};
pub use node::{DEFAULT_NODE_LABEL, Node, PopulatedNode, Position};
pub use pipeline::{Connection, Pipeline};
