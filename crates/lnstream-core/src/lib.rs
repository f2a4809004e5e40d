//! # ln-stream core
//!
//! Domain types shared by the graph importer, the live-update applier
//! and the sync controller: the channel-id codec, the pulled graph model,
//! the persisted snapshot document, topology update events and the
//! upstream source seam.

pub mod chan_id;
pub mod error;
pub mod model;
pub mod snapshot;
pub mod source;
pub mod topology;

pub use chan_id::ChannelId;
pub use error::{StreamError, StreamResult};
pub use model::{ChannelEdge, DirectedPolicy, Graph, Node, RoutingPolicy};
pub use snapshot::SnapshotDocument;
pub use source::{TopologySource, TopologySubscription};
pub use topology::{ChannelCloseUpdate, ChannelEdgeUpdate, NodeUpdate, TopologyUpdate};
