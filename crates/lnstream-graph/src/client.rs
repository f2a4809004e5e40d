//! Bolt connection client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{
    BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType,
    ConfigBuilder, Graph, Query,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{GraphStore, Statement};

/// Hosts reachable without TLS.
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "memgraph-mage"];

/// Configuration for connecting to the graph store.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_max_connections() -> usize {
    8
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: String::new(),
            password: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

impl GraphConfig {
    /// Build a config from host and port, choosing plain bolt for local
    /// hosts and bolt over self-signed TLS for everything else.
    pub fn from_host_port(host: &str, port: u16, user: &str, password: &str) -> Self {
        let scheme = if LOCAL_HOSTS.contains(&host) {
            "bolt://"
        } else {
            "bolt+ssc://"
        };
        Self {
            uri: format!("{scheme}{host}:{port}"),
            user: user.to_string(),
            password: password.to_string(),
            ..Self::default()
        }
    }
}

/// Client for graph store operations.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Create a new GraphClient from config.
    ///
    /// The driver pool is lazy, so a `RETURN 1` ping forces the bolt
    /// handshake and surfaces an unreachable store immediately.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let bolt_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections)
            .fetch_size(200)
            .build()
            .context("Failed to build bolt config")?;

        let graph = Graph::connect(bolt_config)
            .await
            .context("Failed to create graph store connection pool")?;

        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .context("Graph store is not responding to queries")?;

        Ok(Self { graph })
    }

    /// Execute a query and return results as rows.
    pub async fn query(&self, query: Query) -> Result<Vec<neo4rs::Row>> {
        let mut result = self.graph.execute(query).await.context("Graph query failed")?;

        let mut rows = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Get node and relationship counts for status display.
    pub async fn get_counts(&self) -> Result<GraphCounts> {
        let node_query = Query::new("MATCH (n) RETURN count(n) AS count".to_string());
        let rel_query = Query::new("MATCH ()-[r]->() RETURN count(r) AS count".to_string());

        let nodes = self.count(node_query).await?;
        let relationships = self.count(rel_query).await?;

        Ok(GraphCounts {
            nodes: nodes as usize,
            relationships: relationships as usize,
        })
    }

    async fn count(&self, query: Query) -> Result<i64> {
        let rows = self.query(query).await?;
        match rows.into_iter().next() {
            Some(row) => row
                .get::<i64>("count")
                .map_err(|e| anyhow::anyhow!("Failed to get field 'count': {:?}", e)),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn run(&self, statement: Statement) -> Result<()> {
        debug!(params = statement.params().len(), "Running statement");
        self.graph
            .run(to_query(statement))
            .await
            .context("Graph query execution failed")?;
        Ok(())
    }
}

/// Node and relationship counts.
#[derive(Debug, Clone)]
pub struct GraphCounts {
    pub nodes: usize,
    pub relationships: usize,
}

fn to_query(statement: Statement) -> Query {
    let (text, params) = statement.into_parts();
    params
        .into_iter()
        .fold(Query::new(text), |query, (key, value)| query.param(&key, to_bolt(value)))
}

/// Convert a JSON parameter into a bolt value, recursing into lists and maps.
fn to_bolt(value: Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or_default())),
        },
        Value::String(s) => BoltType::String(BoltString::from(s)),
        Value::Array(items) => {
            let items: Vec<BoltType> = items.into_iter().map(to_bolt).collect();
            BoltType::List(BoltList::from(items))
        }
        Value::Object(map) => {
            let mut bolt = BoltMap::with_capacity(map.len());
            for (key, value) in map {
                bolt.put(BoltString::from(key), to_bolt(value));
            }
            BoltType::Map(bolt)
        }
    }
}
