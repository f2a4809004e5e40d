//! Persisted full-graph snapshot document (`describegraph.json`).
//!
//! Numeric fields that may exceed 32 bits travel as decimal strings and
//! are parsed per record, so one malformed record never poisons the rest
//! of the document.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::model::{ChannelEdge, Graph, Node, RoutingPolicy};
use crate::{ChannelId, StreamError, StreamResult};

/// Feature bit advertising support for channels above the legacy size cap.
pub const WUMBO_FEATURE_BIT: &str = "19";

/// Top-level snapshot document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default)]
    pub nodes: Vec<SnapshotNode>,
    #[serde(default)]
    pub edges: Vec<SnapshotEdge>,
}

/// A network address advertised by a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAddress {
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub addr: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(default)]
    pub last_update: i64,
    pub pub_key: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub features: BTreeMap<String, Value>,
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub channel_id: String,
    #[serde(default)]
    pub chan_point: String,
    #[serde(default)]
    pub last_update: i64,
    #[serde(default)]
    pub node1_pub: String,
    #[serde(default)]
    pub node2_pub: String,
    #[serde(default)]
    pub capacity: String,
    #[serde(default)]
    pub node1_policy: Option<SnapshotPolicy>,
    #[serde(default)]
    pub node2_policy: Option<SnapshotPolicy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotPolicy {
    #[serde(default)]
    pub time_lock_delta: u32,
    #[serde(default)]
    pub min_htlc: String,
    #[serde(default)]
    pub fee_base_msat: String,
    #[serde(default)]
    pub fee_rate_milli_msat: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub max_htlc_msat: String,
    #[serde(default)]
    pub last_update: i64,
    #[serde(default)]
    pub custom_records: BTreeMap<String, Value>,
}

impl SnapshotDocument {
    /// Open, read and parse a snapshot file.
    pub fn from_path(path: &Path) -> StreamResult<Self> {
        let file = File::open(path).map_err(|e| {
            StreamError::Snapshot(format!("failed to open snapshot {}: {}", path.display(), e))
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read and parse a snapshot document.
    pub fn from_reader<R: Read>(mut reader: R) -> StreamResult<Self> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| StreamError::Snapshot(format!("failed to read snapshot: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StreamError::Snapshot(format!("failed to unmarshal snapshot: {}", e)))
    }

    /// Convert into the typed pulled-graph shape.
    ///
    /// A policy is considered present when it is a non-null object. Edges
    /// whose numeric fields fail to parse are logged and dropped.
    pub fn into_graph(self) -> Graph {
        let nodes = self
            .nodes
            .into_iter()
            .map(|n| Node {
                addresses: n.address_strings(),
                pub_key: n.pub_key,
                alias: n.alias,
            })
            .collect();

        let mut edges = Vec::with_capacity(self.edges.len());
        for edge in &self.edges {
            match edge.to_channel_edge() {
                Ok(e) => edges.push(e),
                Err(e) => warn!(channel_id = %edge.channel_id, error = %e, "Skipping malformed channel"),
            }
        }

        Graph { nodes, edges }
    }
}

impl SnapshotNode {
    /// Whether the node advertises the large-channel feature bit.
    pub fn is_wumbo(&self) -> bool {
        self.features.contains_key(WUMBO_FEATURE_BIT)
    }

    pub fn address_strings(&self) -> Vec<String> {
        self.addresses.iter().map(|a| a.addr.clone()).collect()
    }
}

impl SnapshotEdge {
    pub fn parsed_channel_id(&self) -> StreamResult<ChannelId> {
        self.channel_id
            .trim()
            .parse::<u64>()
            .map(ChannelId)
            .map_err(|e| StreamError::invalid_record(format!("channel_id '{}': {}", self.channel_id, e)))
    }

    pub fn parsed_capacity(&self) -> StreamResult<i64> {
        parse_amount("capacity", &self.capacity)
    }

    /// Typed channel edge. Fails only on the channel's own fields; a
    /// malformed directional policy is logged and dropped alone.
    pub fn to_channel_edge(&self) -> StreamResult<ChannelEdge> {
        Ok(ChannelEdge {
            channel_id: self.parsed_channel_id()?,
            chan_point: self.chan_point.clone(),
            capacity: self.parsed_capacity()?,
            node1_pub: self.node1_pub.clone(),
            node2_pub: self.node2_pub.clone(),
            node1_policy: self.direction_policy(self.node1_policy.as_ref(), &self.node1_pub),
            node2_policy: self.direction_policy(self.node2_policy.as_ref(), &self.node2_pub),
        })
    }

    fn direction_policy(&self, policy: Option<&SnapshotPolicy>, from: &str) -> Option<RoutingPolicy> {
        match policy?.to_routing_policy() {
            Ok(policy) => Some(policy),
            Err(e) => {
                warn!(channel_id = %self.channel_id, from, error = %e, "Skipping malformed channel policy");
                None
            }
        }
    }
}

impl SnapshotPolicy {
    /// Whether the announcing node actually published this policy.
    ///
    /// Omitted policies deserialize with an empty max HTLC bound.
    pub fn is_announced(&self) -> bool {
        !self.max_htlc_msat.is_empty()
    }

    pub fn to_routing_policy(&self) -> StreamResult<RoutingPolicy> {
        Ok(RoutingPolicy {
            time_lock_delta: self.time_lock_delta,
            min_htlc_msat: parse_amount("min_htlc", &self.min_htlc)?,
            max_htlc_msat: parse_amount("max_htlc_msat", &self.max_htlc_msat)?,
            fee_base_msat: parse_amount("fee_base_msat", &self.fee_base_msat)?,
            fee_rate_milli_msat: parse_amount("fee_rate_milli_msat", &self.fee_rate_milli_msat)?,
            disabled: self.disabled,
            last_update: self.last_update,
        })
    }
}

/// Parse a decimal-string amount; an empty string reads as zero.
pub fn parse_amount(field: &str, value: &str) -> StreamResult<i64> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse::<i64>()
        .map_err(|e| StreamError::invalid_record(format!("{} '{}': {}", field, value, e)))
}
