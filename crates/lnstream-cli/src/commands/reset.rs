//! Full reload from the node.

use anyhow::Result;
use colored::Colorize;
use lnstream_graph::GraphClient;
use lnstream_sync::SyncController;

use crate::output::{print_counts, print_report};

pub async fn execute(controller: SyncController, client: &GraphClient) -> Result<()> {
    println!("{}", "Pulling graph from node...".bold());
    let report = controller.reset_from_live().await?;
    print_report("Graph update complete.", &report);
    print_counts(&client.get_counts().await?);
    Ok(())
}
