//! Record-at-a-time import of a persisted snapshot document.

use lnstream_core::snapshot::{SnapshotEdge, SnapshotNode, SnapshotPolicy};
use lnstream_core::{SnapshotDocument, StreamError, StreamResult};
use tracing::{debug, info, warn};

use super::ImportReport;
use crate::schema::ensure_indexes;
use crate::{GraphStore, Statement};

const NODE_MERGE: &str = "MERGE (n:node {pubkey: $pubKey})
SET n.alias = $alias,
    n.is_wumbo = $is_wumbo,
    n.color = $color,
    n.addresses = $addresses,
    n.last_update = $last_update";

const POLICY_MERGE: &str = "MATCH (a:node {pubkey: $node1}), (b:node {pubkey: $node2})
MERGE (a)-[r:edge {channel_id: $chanID, capacity: $capacity}]->(b)
SET r.fee_base_msat = $feeBase,
    r.fee_rate_milli_msat = $feeRate,
    r.time_lock_delta = $timeLock,
    r.disabled = $disabled,
    r.min_htlc_msat = $minHtlc,
    r.max_htlc_msat = $maxHtlc,
    r.min_liquidity = 0,
    r.max_liquidity = $capacity";

/// Build the merge statement for one snapshot node.
pub fn node_statement(node: &SnapshotNode) -> Statement {
    Statement::new(NODE_MERGE)
        .param("pubKey", node.pub_key.as_str())
        .param("alias", node.alias.as_str())
        .param("is_wumbo", node.is_wumbo())
        .param("color", node.color.as_str())
        .param("addresses", node.address_strings())
        .param("last_update", node.last_update)
}

/// Build the merge statements for the announced directions of a channel.
///
/// Both directions share the channel id (`height:index:output`) and
/// capacity; a direction is emitted only if its policy was announced.
/// The outer error covers the channel's own fields; each direction's
/// policy succeeds or fails on its own.
pub fn policy_statements(edge: &SnapshotEdge) -> StreamResult<Vec<StreamResult<Statement>>> {
    let chan_id = edge.parsed_channel_id()?.encode();
    let capacity = edge.parsed_capacity()?;

    let directions = [
        (&edge.node1_policy, &edge.node1_pub, &edge.node2_pub),
        (&edge.node2_policy, &edge.node2_pub, &edge.node1_pub),
    ];

    Ok(directions
        .into_iter()
        .filter_map(|(policy, from, to)| {
            let policy = policy.as_ref().filter(|p| p.is_announced())?;
            Some(policy_statement(policy, from, to, &chan_id, capacity))
        })
        .collect())
}

fn policy_statement(
    policy: &SnapshotPolicy,
    from: &str,
    to: &str,
    chan_id: &str,
    capacity: i64,
) -> StreamResult<Statement> {
    let policy = policy.to_routing_policy()?;
    Ok(Statement::new(POLICY_MERGE)
        .param("node1", from)
        .param("node2", to)
        .param("chanID", chan_id)
        .param("capacity", capacity)
        .param("feeBase", policy.fee_base_msat)
        .param("feeRate", policy.fee_rate_milli_msat)
        .param("timeLock", policy.time_lock_delta)
        .param("disabled", policy.disabled)
        .param("minHtlc", policy.min_htlc_msat)
        .param("maxHtlc", policy.max_htlc_msat))
}

/// Write a parsed snapshot to the store.
///
/// The store is expected to be freshly emptied, so failing to create an
/// index is fatal here. Individual record failures are logged and
/// counted; they never abort the import.
pub async fn write_snapshot(store: &dyn GraphStore, doc: &SnapshotDocument) -> StreamResult<ImportReport> {
    info!(nodes = doc.nodes.len(), channels = doc.edges.len(), "Writing snapshot");

    let failures = ensure_indexes(store).await;
    if let Some(first) = failures.first() {
        return Err(StreamError::store(format!(
            "failed to create {} index: {}",
            first.index, first.error
        )));
    }

    let mut report = ImportReport::default();

    for node in &doc.nodes {
        match store.run(node_statement(node)).await {
            Ok(()) => report.nodes_written += 1,
            Err(e) => {
                warn!(pub_key = %node.pub_key, error = %e, "Failed to write node");
                report.nodes_failed += 1;
                report.record_failure(&e);
            }
        }
    }

    for edge in &doc.edges {
        let statements = match policy_statements(edge) {
            Ok(statements) => statements,
            Err(e) => {
                warn!(channel_id = %edge.channel_id, error = %e, "Skipping malformed channel");
                report.records_skipped += 1;
                continue;
            }
        };
        if statements.is_empty() {
            debug!(channel_id = %edge.channel_id, "Channel has no announced policy");
            report.records_skipped += 1;
        }
        for statement in statements {
            let statement = match statement {
                Ok(statement) => statement,
                Err(e) => {
                    warn!(channel_id = %edge.channel_id, error = %e, "Skipping malformed channel policy");
                    report.records_skipped += 1;
                    continue;
                }
            };
            match store.run(statement).await {
                Ok(()) => report.edges_written += 1,
                Err(e) => {
                    warn!(channel_id = %edge.channel_id, error = %e, "Failed to write channel policy");
                    report.edges_failed += 1;
                    report.record_failure(&e);
                }
            }
        }
    }

    info!(
        nodes = report.nodes_written,
        edges = report.edges_written,
        skipped = report.records_skipped,
        "Finished writing snapshot"
    );
    Ok(report)
}
