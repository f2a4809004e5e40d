//! Batched upserts.
//!
//! Records are written `BATCH_SIZE` at a time. Each batch is one
//! statement whose `$rows` parameter carries the whole batch, so the
//! store expands it with `UNWIND` instead of taking one round trip per
//! record.

use serde_json::Value;
use tracing::{debug, warn};

use crate::{GraphStore, Statement};

/// Records per batch.
///
/// Fixed: larger batches mean fewer round trips but bigger request
/// payloads and more pressure on the store's parameter limits.
pub const BATCH_SIZE: usize = 100;

/// Name of the list parameter every batch template must `UNWIND`.
pub const ROWS_PARAM: &str = "rows";

/// Outcome of a batched write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub batches: usize,
    pub failed_batches: usize,
    pub rows_written: usize,
    pub rows_failed: usize,
    pub last_error: Option<String>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed_batches == 0
    }
}

/// Number of batches `rows` records split into.
pub fn batch_count(rows: usize) -> usize {
    rows.div_ceil(BATCH_SIZE)
}

/// Write `rows` through `template`, one statement per batch.
///
/// A failed batch is logged and recorded; the remaining batches are
/// still attempted.
pub async fn write_batches(store: &dyn GraphStore, template: &str, rows: &[Value]) -> BatchReport {
    let mut report = BatchReport::default();

    for (batch, chunk) in rows.chunks(BATCH_SIZE).enumerate() {
        let statement = Statement::new(template).param(ROWS_PARAM, chunk.to_vec());
        report.batches += 1;

        match store.run(statement).await {
            Ok(()) => {
                debug!(batch, rows = chunk.len(), "Batch written");
                report.rows_written += chunk.len();
            }
            Err(e) => {
                warn!(batch, rows = chunk.len(), error = %e, "Batch write failed");
                report.failed_batches += 1;
                report.rows_failed += chunk.len();
                report.last_error = Some(format!("{:#}", e));
            }
        }
    }

    report
}
