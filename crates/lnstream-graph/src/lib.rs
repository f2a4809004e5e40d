//! # ln-stream graph
//!
//! Everything that writes to the property-graph store: the store seam,
//! the bolt client, index management, batched upserts, both import
//! paths, the live update applier and the post-import step.

pub mod batch;
pub mod client;
pub mod import;
pub mod post_import;
pub mod schema;
pub mod store;
pub mod updates;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use batch::{BatchReport, BATCH_SIZE};
pub use client::{GraphClient, GraphConfig, GraphCounts};
pub use import::ImportReport;
pub use store::{GraphStore, Statement};
pub use updates::{apply_update, ApplyReport};
