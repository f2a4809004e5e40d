//! CLI command definitions and handlers.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use lnstream_core::TopologySource;
use lnstream_graph::{GraphClient, GraphConfig};
use lnstream_lnd::{LndConfig, LndRestSource};
use lnstream_sync::{ControllerConfig, SyncController};
use tracing::{info, warn};

pub mod follow;
pub mod reset;
pub mod serve;
pub mod snapshot;

/// ln-stream - Lightning channel graph to property graph sync
#[derive(Parser)]
#[command(name = "lnstream")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Also write logs to this file
    #[arg(long, global = true, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Graph store and node connection settings.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Graph store host
    #[arg(long, global = true, env = "NEO4J_HOST", default_value = "localhost")]
    pub neo4j_host: String,

    /// Graph store bolt port
    #[arg(long, global = true, env = "NEO4J_PORT", default_value = "7687")]
    pub neo4j_port: u16,

    #[arg(long, global = true, env = "NEO4J_USERNAME", default_value = "")]
    pub neo4j_username: String,

    #[arg(long, global = true, env = "NEO4J_PASSWORD", default_value = "", hide_env_values = true)]
    pub neo4j_password: String,

    /// Node REST gateway, e.g. https://localhost:8080. Unset means snapshot-only mode
    #[arg(long, global = true, env = "LND_REST_ADDRESS")]
    pub lnd_rest_address: Option<String>,

    #[arg(long, global = true, env = "LND_MACAROON_PATH")]
    pub lnd_macaroon_path: Option<PathBuf>,

    #[arg(long, global = true, env = "LND_TLS_CERT_PATH")]
    pub lnd_tls_cert_path: Option<PathBuf>,

    /// Snapshot document for load-snapshot
    #[arg(long, global = true, env = "SNAPSHOT_PATH", default_value = "./describegraph.json")]
    pub snapshot_path: PathBuf,

    /// Skip the post-import step after a full reload
    #[arg(long, global = true)]
    pub skip_post_import: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP control surface
    Serve(serve::ServeArgs),

    /// Drop the store and reload it from a full node pull
    Reset,

    /// Drop the store and reload it from a snapshot file
    LoadSnapshot(snapshot::LoadSnapshotArgs),

    /// Apply live topology updates until Ctrl-C or the stream ends
    Follow,
}

impl ConnectionArgs {
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig::from_host_port(
            &self.neo4j_host,
            self.neo4j_port,
            &self.neo4j_username,
            &self.neo4j_password,
        )
    }

    pub fn lnd_config(&self) -> Option<LndConfig> {
        let rest_url = self.lnd_rest_address.clone()?;
        let Some(macaroon_path) = self.lnd_macaroon_path.clone() else {
            warn!("LND_REST_ADDRESS is set but LND_MACAROON_PATH is not");
            return None;
        };
        Some(LndConfig {
            rest_url,
            macaroon_path,
            tls_cert_path: self.lnd_tls_cert_path.clone(),
        })
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            snapshot_path: self.snapshot_path.clone(),
            post_process: !self.skip_post_import,
            ..ControllerConfig::default()
        }
    }

    /// Connect to the graph store and, if configured, the node.
    ///
    /// A node that cannot be set up degrades to snapshot-only mode rather
    /// than failing startup. The client is returned alongside for status
    /// queries.
    pub async fn build_controller(&self) -> Result<(SyncController, GraphClient)> {
        let graph_config = self.graph_config();
        info!(uri = %graph_config.uri, "Connecting to graph store");
        let client = GraphClient::connect(&graph_config).await?;

        let source: Option<Arc<dyn TopologySource>> = match self.lnd_config() {
            Some(config) => match LndRestSource::new(&config) {
                Ok(source) => Some(Arc::new(source)),
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "Failed to set up node connection (snapshot-only mode)");
                    None
                }
            },
            None => {
                info!("Node REST gateway not configured, running in snapshot-only mode");
                None
            }
        };

        if source.is_none() {
            println!("  {}", "snapshot-only mode: reset and live updates are unavailable".yellow());
        }

        let controller = SyncController::new(Arc::new(client.clone()), source, self.controller_config());
        Ok((controller, client))
    }
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let (controller, client) = self.connection.build_controller().await?;

        match self.command {
            Commands::Serve(args) => serve::execute(args, controller).await,
            Commands::Reset => reset::execute(controller, &client).await,
            Commands::LoadSnapshot(args) => snapshot::execute(args, controller, &client).await,
            Commands::Follow => follow::execute(controller).await,
        }
    }
}
