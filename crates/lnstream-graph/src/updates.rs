//! Live topology update applier.
//!
//! Each event becomes exactly one statement. Within a message, node
//! updates go first, then edge updates, then closes, so an edge that
//! references a node announced in the same message is written after
//! that node exists.

use lnstream_core::{ChannelCloseUpdate, ChannelEdgeUpdate, NodeUpdate, TopologyUpdate};
use tracing::{debug, warn};

use crate::{GraphStore, Statement};

const NODE_MERGE: &str = "MERGE (n:node {pubkey: $pubKey})
SET n.alias = $alias";

// A disable signal only touches an existing edge; it never creates one.
const EDGE_DISABLE: &str = "MATCH ()-[r:edge]->()
WHERE r.channel_id IN $channelIds
SET r.disabled = true";

// Reuse the directed edge under whichever spelling an import wrote it;
// create it under `$channelId` only if neither exists.
const EDGE_MERGE: &str = "MERGE (n1:node {pubkey: $advertisingNode})
MERGE (n2:node {pubkey: $connectingNode})
WITH n1, n2
OPTIONAL MATCH (n1)-[found:edge]->(n2)
WHERE found.channel_id IN $channelIds
WITH n1, n2, coalesce(found.channel_id, $channelId) AS key
MERGE (n1)-[r:edge {channel_id: key}]->(n2)
SET r.capacity = $capacity,
    r.fee_base_msat = $fee_base_msat,
    r.fee_rate_milli_msat = $fee_rate_milli_msat,
    r.time_lock_delta = $time_lock_delta,
    r.min_htlc_msat = $min_htlc_msat,
    r.max_htlc_msat = $max_htlc_msat,
    r.disabled = $disabled";

// Endpoints stay: a closed channel says nothing about its nodes.
const EDGE_DELETE: &str = "MATCH ()-[r:edge]->()
WHERE r.channel_id IN $channelIds
DELETE r";

/// Kind of a single topology event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Node,
    Edge,
    Close,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Node => "node",
            UpdateKind::Edge => "edge",
            UpdateKind::Close => "close",
        }
    }
}

/// Outcome of applying one topology message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub applied: usize,
    pub failed: usize,
}

pub fn node_update_statement(update: &NodeUpdate) -> Statement {
    Statement::new(NODE_MERGE)
        .param("pubKey", update.identity_key.as_str())
        .param("alias", update.alias.as_str())
}

/// An existing edge is updated in place whether a snapshot (`h:i:o`) or a
/// live pull (`hxixo`) wrote it. New edges take the `h:i:o` form.
pub fn edge_update_statement(update: &ChannelEdgeUpdate) -> Statement {
    let policy = &update.routing_policy;
    if policy.disabled {
        return Statement::new(EDGE_DISABLE)
            .param("channelIds", update.channel_id.store_keys().to_vec());
    }

    Statement::new(EDGE_MERGE)
        .param("advertisingNode", update.advertising_node.as_str())
        .param("connectingNode", update.connecting_node.as_str())
        .param("channelId", update.channel_id.encode())
        .param("channelIds", update.channel_id.store_keys().to_vec())
        .param("capacity", update.capacity)
        .param("fee_base_msat", policy.fee_base_msat)
        .param("fee_rate_milli_msat", policy.fee_rate_milli_msat)
        .param("time_lock_delta", policy.time_lock_delta)
        .param("min_htlc_msat", policy.min_htlc_msat)
        .param("max_htlc_msat", policy.max_htlc_msat)
        .param("disabled", policy.disabled)
}

/// Delete every directed edge of the closed channel.
pub fn close_update_statement(update: &ChannelCloseUpdate) -> Statement {
    Statement::new(EDGE_DELETE).param("channelIds", update.channel_id.store_keys().to_vec())
}

/// All statements for one message, in application order.
pub fn update_statements(update: &TopologyUpdate) -> Vec<(UpdateKind, Statement)> {
    let nodes = update
        .node_updates
        .iter()
        .map(|u| (UpdateKind::Node, node_update_statement(u)));
    let edges = update
        .channel_edge_updates
        .iter()
        .map(|u| (UpdateKind::Edge, edge_update_statement(u)));
    let closes = update
        .channel_close_updates
        .iter()
        .map(|u| (UpdateKind::Close, close_update_statement(u)));
    nodes.chain(edges).chain(closes).collect()
}

/// Apply one topology message as a sequence of independent writes.
///
/// A failed write is logged and the rest of the message still applies.
pub async fn apply_update(store: &dyn GraphStore, update: &TopologyUpdate) -> ApplyReport {
    let mut report = ApplyReport::default();
    for (kind, statement) in update_statements(update) {
        match store.run(statement).await {
            Ok(()) => report.applied += 1,
            Err(e) => {
                warn!(kind = kind.as_str(), error = %e, "Failed to apply topology update");
                report.failed += 1;
            }
        }
    }
    debug!(applied = report.applied, failed = report.failed, "Applied topology message");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingStore;
    use lnstream_core::{ChannelId, RoutingPolicy};
    use serde_json::json;

    const CHAN: u64 = 0x0001_F400_000A_0001;

    fn edge_update(disabled: bool) -> ChannelEdgeUpdate {
        ChannelEdgeUpdate {
            channel_id: ChannelId(CHAN),
            chan_point: "abcd:1".to_string(),
            capacity: 5_000_000,
            routing_policy: RoutingPolicy {
                time_lock_delta: 144,
                fee_base_msat: 1000,
                fee_rate_milli_msat: 1,
                disabled,
                ..Default::default()
            },
            advertising_node: "02aa".to_string(),
            connecting_node: "03bb".to_string(),
        }
    }

    fn close_update() -> ChannelCloseUpdate {
        ChannelCloseUpdate {
            channel_id: ChannelId(CHAN),
            chan_point: "abcd:1".to_string(),
            capacity: 5_000_000,
            closed_height: 800_000,
        }
    }

    #[test]
    fn test_disabled_update_is_match_only() {
        let stmt = edge_update_statement(&edge_update(true));
        assert!(stmt.text().starts_with("MATCH"));
        assert!(!stmt.text().contains("MERGE"));
        assert!(!stmt.text().contains("CREATE"));
        assert_eq!(stmt.get("channelIds"), Some(&json!(["500:10:1", "500x10x1"])));
        assert_eq!(stmt.params().len(), 1);
    }

    #[test]
    fn test_enabled_update_merges_endpoints_and_edge() {
        let stmt = edge_update_statement(&edge_update(false));
        assert!(stmt.text().contains("MERGE (n1:node {pubkey: $advertisingNode})"));
        assert!(stmt.text().contains("MERGE (n2:node {pubkey: $connectingNode})"));
        assert_eq!(stmt.get("channelId"), Some(&json!("500:10:1")));
        assert_eq!(stmt.get("channelIds"), Some(&json!(["500:10:1", "500x10x1"])));
        assert!(stmt.text().contains("coalesce(found.channel_id, $channelId)"));
        assert_eq!(stmt.get("time_lock_delta"), Some(&json!(144)));
        assert_eq!(stmt.get("disabled"), Some(&json!(false)));
    }

    #[test]
    fn test_close_deletes_edges_only() {
        let stmt = close_update_statement(&close_update());
        assert!(stmt.text().contains("DELETE r"));
        assert!(!stmt.text().contains("DETACH"));
        assert!(!stmt.text().contains("(n"));
        assert_eq!(stmt.get("channelIds"), Some(&json!(["500:10:1", "500x10x1"])));
    }

    #[test]
    fn test_statement_order_within_message() {
        let update = TopologyUpdate {
            node_updates: vec![NodeUpdate { identity_key: "02aa".to_string(), ..Default::default() }],
            channel_edge_updates: vec![edge_update(false), edge_update(true)],
            channel_close_updates: vec![close_update()],
        };
        let kinds: Vec<UpdateKind> = update_statements(&update).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![UpdateKind::Node, UpdateKind::Edge, UpdateKind::Edge, UpdateKind::Close]
        );
    }

    #[tokio::test]
    async fn test_apply_continues_after_failure() {
        let store = RecordingStore::new().fail_call(0);
        let update = TopologyUpdate {
            node_updates: vec![
                NodeUpdate { identity_key: "02aa".to_string(), alias: "a".to_string(), ..Default::default() },
                NodeUpdate { identity_key: "03bb".to_string(), alias: "b".to_string(), ..Default::default() },
            ],
            channel_edge_updates: vec![edge_update(false)],
            channel_close_updates: vec![],
        };
        let report = apply_update(&store, &update).await;
        assert_eq!(report, ApplyReport { applied: 2, failed: 1 });
        assert_eq!(store.statements().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_message_writes_nothing() {
        let store = RecordingStore::new();
        let report = apply_update(&store, &TopologyUpdate::default()).await;
        assert_eq!(report, ApplyReport::default());
        assert!(store.statements().is_empty());
    }

    #[test]
    fn test_live_update_reaches_edges_from_either_import() {
        use crate::import::{pull, snapshot};
        use lnstream_core::snapshot::{SnapshotEdge, SnapshotPolicy};
        use lnstream_core::ChannelEdge;

        let live = edge_update_statement(&edge_update(false));
        let keys = live.get("channelIds").and_then(|v| v.as_array()).unwrap().clone();

        let snapshot_edge = SnapshotEdge {
            channel_id: CHAN.to_string(),
            node1_pub: "02aa".to_string(),
            node2_pub: "03bb".to_string(),
            capacity: "5000000".to_string(),
            node1_policy: Some(SnapshotPolicy { max_htlc_msat: "1000".to_string(), ..Default::default() }),
            ..Default::default()
        };
        let imported = snapshot::policy_statements(&snapshot_edge).unwrap().remove(0).unwrap();
        assert!(keys.contains(imported.get("chanID").unwrap()));

        let pulled = pull::edge_rows(&[ChannelEdge {
            channel_id: ChannelId(CHAN),
            chan_point: String::new(),
            capacity: 5_000_000,
            node1_pub: "02aa".to_string(),
            node2_pub: "03bb".to_string(),
            node1_policy: Some(RoutingPolicy::default()),
            node2_policy: None,
        }]);
        assert!(keys.contains(&pulled[0]["chan_id"]));

        // Same direction as the snapshot edge, so the OPTIONAL MATCH finds it.
        assert_eq!(live.get("advertisingNode"), imported.get("node1"));
        assert_eq!(live.get("connectingNode"), imported.get("node2"));
    }
}
