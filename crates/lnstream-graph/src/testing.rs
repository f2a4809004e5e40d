//! In-process store fake for tests.

use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::{GraphStore, Statement};

/// Records every statement it is asked to run, optionally failing some.
#[derive(Default)]
pub struct RecordingStore {
    statements: Mutex<Vec<Statement>>,
    fail_matching: Mutex<Vec<String>>,
    fail_calls: Mutex<Vec<usize>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement whose text contains `fragment`.
    pub fn fail_matching(self, fragment: &str) -> Self {
        self.fail_matching.lock().unwrap().push(fragment.to_string());
        self
    }

    /// Fail the statement with the given zero-based call index.
    pub fn fail_call(self, index: usize) -> Self {
        self.fail_calls.lock().unwrap().push(index);
        self
    }

    /// Every statement attempted so far, failed ones included.
    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.text().to_string()).collect()
    }

    pub fn count_matching(&self, fragment: &str) -> usize {
        self.texts().iter().filter(|t| t.contains(fragment)).count()
    }

    pub fn clear(&self) {
        self.statements.lock().unwrap().clear();
    }
}

#[async_trait]
impl GraphStore for RecordingStore {
    async fn run(&self, statement: Statement) -> Result<()> {
        let fail = {
            let mut statements = self.statements.lock().unwrap();
            let index = statements.len();
            let fail = self.fail_calls.lock().unwrap().contains(&index)
                || self
                    .fail_matching
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|f| statement.text().contains(f.as_str()));
            statements.push(statement);
            fail
        };
        if fail {
            bail!("injected failure");
        }
        Ok(())
    }
}
