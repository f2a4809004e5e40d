//! Foreground live update loop.

use anyhow::Result;
use colored::Colorize;
use lnstream_sync::SyncController;
use tracing::info;

/// Start live updates and block until Ctrl-C or until the upstream
/// stream stops them.
pub async fn execute(controller: SyncController) -> Result<()> {
    let mut running = controller.watch_running();
    controller.start().await?;

    println!("{}", "Following graph updates".green().bold());
    println!("  {}", "Ctrl+C to stop".dimmed());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping live updates");
        }
        _ = running.wait_for(|running| !*running) => {
            println!("{}", "Graph update stream stopped".yellow());
        }
    }

    controller.shutdown().await;
    let status = controller.status().await;
    info!(generation = status.generation, "Live updates stopped");
    Ok(())
}
