//! Pulled graph model: the typed shape of a freshly fetched topology.

use serde::{Deserialize, Serialize};

use crate::ChannelId;

/// A node as returned by a live graph pull.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub pub_key: String,
    pub alias: String,
    pub addresses: Vec<String>,
}

/// Routing terms announced by one endpoint of a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    pub time_lock_delta: u32,
    pub min_htlc_msat: i64,
    pub max_htlc_msat: i64,
    pub fee_base_msat: i64,
    pub fee_rate_milli_msat: i64,
    pub disabled: bool,
    pub last_update: i64,
}

/// A channel between two nodes with up to two directional policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEdge {
    pub channel_id: ChannelId,
    pub chan_point: String,
    pub capacity: i64,
    pub node1_pub: String,
    pub node2_pub: String,
    pub node1_policy: Option<RoutingPolicy>,
    pub node2_policy: Option<RoutingPolicy>,
}

/// One direction of a channel: traffic flowing `from` the announcing node `to` its peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectedPolicy<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub policy: &'a RoutingPolicy,
}

impl ChannelEdge {
    /// Expand into one entry per announced direction.
    ///
    /// node1's policy governs node1 → node2, node2's policy node2 → node1.
    /// A present policy is yielded even if all of its fields are zero.
    pub fn directions(&self) -> Vec<DirectedPolicy<'_>> {
        let mut out = Vec::with_capacity(2);
        if let Some(policy) = &self.node1_policy {
            out.push(DirectedPolicy {
                from: &self.node1_pub,
                to: &self.node2_pub,
                policy,
            });
        }
        if let Some(policy) = &self.node2_policy {
            out.push(DirectedPolicy {
                from: &self.node2_pub,
                to: &self.node1_pub,
                policy,
            });
        }
        out
    }
}

/// A full pulled topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<ChannelEdge>,
}

impl Graph {
    /// Number of directed edge records this graph expands to.
    pub fn directed_edge_count(&self) -> usize {
        self.edges.iter().map(|e| e.directions().len()).sum()
    }
}
