//! Post-import processing run after a full reload.

use lnstream_core::{StreamError, StreamResult};
use tracing::info;

use crate::{GraphStore, Statement};

/// A named post-import statement.
struct Step {
    desc: &'static str,
    query: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        desc: "fix fee denominations",
        query: "MATCH (n)-[r]->(m)
SET r.fee_base_milli_msat = r.fee_base_msat * 1000",
    },
    Step {
        desc: "initialize node capacity",
        query: "MATCH (n)
SET n.total_capacity = 0",
    },
    Step {
        desc: "calculate node capacity",
        query: "MATCH (n)-[r]-(m)
WITH n, sum(r.capacity) AS total_capacity
SET n.total_capacity = total_capacity / 2",
    },
    Step {
        desc: "calculate node betweenness centrality",
        query: "CALL betweenness_centrality.get() YIELD betweenness_centrality, node
WITH betweenness_centrality, node
SET node.betweenness_centrality = betweenness_centrality",
    },
    Step {
        desc: "calculate edge betweenness centrality",
        query: "MATCH (n)-[r]-(m)
SET r.betweenness_centrality = (n.betweenness_centrality + m.betweenness_centrality) / 2",
    },
];

/// Run the post-import steps in order, stopping at the first failure.
pub async fn run_post_import(store: &dyn GraphStore) -> StreamResult<()> {
    info!("Running post-import setup...");

    for step in STEPS {
        store
            .run(Statement::new(step.query))
            .await
            .map_err(|e| StreamError::store(format!("failed to {}: {:#}", step.desc, e)))?;
    }

    info!(steps = STEPS.len(), "Post-import setup complete");
    Ok(())
}
