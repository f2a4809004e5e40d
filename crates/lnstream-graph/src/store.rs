//! Graph store seam: parameterized statements and the trait that runs them.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A parameterized Cypher statement.
///
/// Parameters are JSON values so that list-of-map parameters can be
/// expanded server-side with `UNWIND`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    text: String,
    params: BTreeMap<String, Value>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: BTreeMap::new(),
        }
    }

    /// Bind a parameter, replacing any previous value under `key`.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn into_parts(self) -> (String, BTreeMap<String, Value>) {
        (self.text, self.params)
    }
}

/// A store that executes write statements.
///
/// Implementations must tolerate concurrent callers; atomicity is per
/// statement.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn run(&self, statement: Statement) -> Result<()>;
}
