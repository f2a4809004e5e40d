//! Incremental topology update events.

use serde::{Deserialize, Serialize};

use crate::{ChannelId, RoutingPolicy};

/// A node (re)announcement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    pub identity_key: String,
    pub alias: String,
    pub addresses: Vec<String>,
    pub color: String,
}

/// A new or changed directional channel policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEdgeUpdate {
    pub channel_id: ChannelId,
    pub chan_point: String,
    pub capacity: i64,
    pub routing_policy: RoutingPolicy,
    pub advertising_node: String,
    pub connecting_node: String,
}

/// A channel that was closed on chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCloseUpdate {
    pub channel_id: ChannelId,
    pub chan_point: String,
    pub capacity: i64,
    pub closed_height: u32,
}

/// One message from the topology subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyUpdate {
    pub node_updates: Vec<NodeUpdate>,
    pub channel_edge_updates: Vec<ChannelEdgeUpdate>,
    pub channel_close_updates: Vec<ChannelCloseUpdate>,
}

impl TopologyUpdate {
    /// Total number of events carried by this message.
    pub fn len(&self) -> usize {
        self.node_updates.len() + self.channel_edge_updates.len() + self.channel_close_updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
