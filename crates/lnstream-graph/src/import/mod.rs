//! Bulk import of a full topology into the graph store.
//!
//! Two entry points share one output contract:
//! - [`pull::write_graph`] writes a freshly pulled graph in batches;
//! - [`snapshot::write_snapshot`] writes a persisted snapshot record by record.

pub mod pull;
pub mod snapshot;

use crate::batch::BatchReport;
use crate::schema::IndexFailure;

/// Result of an import run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub nodes_written: usize,
    pub nodes_failed: usize,
    pub edges_written: usize,
    pub edges_failed: usize,
    /// Records skipped before any write was attempted (malformed or unannounced).
    pub records_skipped: usize,
    pub index_failures: Vec<IndexFailure>,
    pub last_error: Option<String>,
}

impl ImportReport {
    fn record_nodes(&mut self, batch: BatchReport) {
        self.nodes_written += batch.rows_written;
        self.nodes_failed += batch.rows_failed;
        if batch.last_error.is_some() {
            self.last_error = batch.last_error;
        }
    }

    fn record_edges(&mut self, batch: BatchReport) {
        self.edges_written += batch.rows_written;
        self.edges_failed += batch.rows_failed;
        if batch.last_error.is_some() {
            self.last_error = batch.last_error;
        }
    }

    fn record_failure(&mut self, error: &anyhow::Error) {
        self.last_error = Some(format!("{:#}", error));
    }

    /// Whether every attempted write succeeded.
    pub fn is_clean(&self) -> bool {
        self.nodes_failed == 0 && self.edges_failed == 0 && self.index_failures.is_empty()
    }
}
