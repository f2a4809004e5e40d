//! Web server command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use lnstream_sync::SyncController;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
}

pub async fn execute(args: ServeArgs, controller: SyncController) -> Result<()> {
    println!();
    println!("  {} {}", "ln-stream".cyan().bold(), "Control Server".bold());
    println!();
    for route in ["toggle-updates", "reset-graph", "load-local-snapshot", "get-status"] {
        println!("  {}  http://{}:{}/{}", "GET".green(), args.host, args.port, route);
    }
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    lnstream_web::run_server(controller, &args.host, args.port).await?;

    Ok(())
}
