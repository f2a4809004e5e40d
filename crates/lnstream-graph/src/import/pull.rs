//! Batched import of a freshly pulled graph.

use lnstream_core::{ChannelEdge, Graph, Node};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::ImportReport;
use crate::batch::write_batches;
use crate::schema::ensure_indexes;
use crate::GraphStore;

/// Node upsert: the public key is the merge key and is never overwritten.
pub const NODE_UPSERT: &str = "UNWIND $rows AS row
MERGE (n:node {pubkey: row.pubKey})
SET n.alias = row.alias, n.addresses = row.addresses";

/// Directed edge upsert keyed on (channel id, capacity) between the two endpoints.
pub const EDGE_UPSERT: &str = "UNWIND $rows AS row
MATCH (a:node {pubkey: row.from}), (b:node {pubkey: row.to})
MERGE (a)-[r:edge {channel_id: row.chan_id, capacity: row.capacity}]->(b)
SET r.fee_base_msat = row.fee_base,
    r.fee_rate_milli_msat = row.fee_rate,
    r.time_lock_delta = row.time_lock,
    r.disabled = row.disabled,
    r.min_htlc_msat = row.min_htlc,
    r.max_htlc_msat = row.max_htlc,
    r.min_liquidity = row.min_liquidity,
    r.max_liquidity = row.max_liquidity";

/// Project nodes to their minimal records.
pub fn node_rows(nodes: &[Node]) -> Vec<Value> {
    nodes
        .iter()
        .map(|node| {
            json!({
                "pubKey": node.pub_key,
                "alias": node.alias,
                "addresses": node.addresses,
            })
        })
        .collect()
}

/// Expand channels into one record per announced direction.
pub fn edge_rows(edges: &[ChannelEdge]) -> Vec<Value> {
    let mut rows = Vec::with_capacity(edges.len() * 2);
    for edge in edges {
        let chan_id = edge.channel_id.store_key();
        for direction in edge.directions() {
            let policy = direction.policy;
            rows.push(json!({
                "from": direction.from,
                "to": direction.to,
                "chan_id": chan_id,
                "capacity": edge.capacity,
                "fee_base": policy.fee_base_msat,
                "fee_rate": policy.fee_rate_milli_msat,
                "time_lock": policy.time_lock_delta,
                "disabled": policy.disabled,
                "min_htlc": policy.min_htlc_msat,
                "max_htlc": policy.max_htlc_msat,
                "min_liquidity": 0,
                "max_liquidity": edge.capacity,
            }));
        }
    }
    rows
}

/// Write a pulled graph: indexes, then nodes, then directed edges.
///
/// Index failures are logged and the import proceeds.
pub async fn write_graph(store: &dyn GraphStore, graph: &Graph) -> ImportReport {
    info!(nodes = graph.nodes.len(), channels = graph.edges.len(), "Writing pulled graph");
    let mut report = ImportReport::default();

    for failure in ensure_indexes(store).await {
        warn!(index = failure.index, error = %failure.error, "Index creation failed, continuing");
        report.index_failures.push(failure);
    }

    let nodes = write_batches(store, NODE_UPSERT, &node_rows(&graph.nodes)).await;
    report.record_nodes(nodes);

    let edges = write_batches(store, EDGE_UPSERT, &edge_rows(&graph.edges)).await;
    report.record_edges(edges);

    info!(
        nodes = report.nodes_written,
        edges = report.edges_written,
        failed = report.nodes_failed + report.edges_failed,
        "Finished writing pulled graph"
    );
    report
}
