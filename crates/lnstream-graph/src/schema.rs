//! Lookup indexes and whole-store drop.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{GraphStore, Statement};

/// Index statements, by name.
const INDEXES: &[(&str, &str)] = &[
    ("node pubkey", "CREATE INDEX ON :node(pubkey)"),
    ("edge channel_id", "CREATE INDEX ON :edge(channel_id)"),
];

const DROP_INDEXES: &[(&str, &str)] = &[
    ("node pubkey", "DROP INDEX ON :node(pubkey)"),
    ("edge channel_id", "DROP INDEX ON :edge(channel_id)"),
];

const DROP_ALL: &str = "MATCH (n) DETACH DELETE n";

/// An index that could not be created.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexFailure {
    pub index: &'static str,
    pub error: String,
}

/// Create the node-key and edge-channel-id indexes.
///
/// Every index is attempted; the failures are returned for the caller
/// to judge.
pub async fn ensure_indexes(store: &dyn GraphStore) -> Vec<IndexFailure> {
    let mut failures = Vec::new();
    for (index, statement) in INDEXES {
        if let Err(e) = store.run(Statement::new(*statement)).await {
            failures.push(IndexFailure {
                index,
                error: format!("{:#}", e),
            });
        }
    }
    failures
}

/// Delete every node and relationship, then drop the indexes.
///
/// Only the delete is fatal; index drops are best-effort.
pub async fn drop_all(store: &dyn GraphStore) -> Result<()> {
    info!("Dropping graph store contents");
    store
        .run(Statement::new(DROP_ALL))
        .await
        .context("failed to drop database")?;

    for (index, statement) in DROP_INDEXES {
        if let Err(e) = store.run(Statement::new(*statement)).await {
            warn!(index, error = %e, "Failed to drop index");
        }
    }
    Ok(())
}
