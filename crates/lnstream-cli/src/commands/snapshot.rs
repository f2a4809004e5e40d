//! Full reload from a snapshot file.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use lnstream_graph::GraphClient;
use lnstream_sync::SyncController;
use std::path::PathBuf;

use crate::output::{print_counts, print_report};

#[derive(Args)]
pub struct LoadSnapshotArgs {
    /// Snapshot file (defaults to --snapshot-path)
    pub path: Option<PathBuf>,
}

pub async fn execute(args: LoadSnapshotArgs, controller: SyncController, client: &GraphClient) -> Result<()> {
    let path = args
        .path
        .unwrap_or_else(|| controller.config().snapshot_path.clone());
    println!("{} {}", "Loading snapshot".bold(), path.display().to_string().cyan());

    let report = controller.load_snapshot_from(&path).await?;
    print_report("Snapshot load complete.", &report);
    print_counts(&client.get_counts().await?);
    Ok(())
}
