//! REST gateway client implementing [`TopologySource`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use lnstream_core::{Graph, SnapshotDocument, TopologySource, TopologySubscription, TopologyUpdate};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::wire::{parse_stream_line, LineBuffer};

/// Header carrying the hex-encoded macaroon.
pub const MACAROON_HEADER: &str = "Grpc-Metadata-macaroon";

/// Queue depth between the stream reader and the consumer.
const CHANNEL_CAPACITY: usize = 64;

/// Connection settings for a node's REST gateway.
#[derive(Debug, Clone)]
pub struct LndConfig {
    /// Base URL, e.g. `https://localhost:8080`.
    pub rest_url: String,
    pub macaroon_path: PathBuf,
    /// Self-signed gateway certificate to trust. `None` uses system roots.
    pub tls_cert_path: Option<PathBuf>,
}

/// Topology source backed by `GET /v1/graph` and `GET /v1/graph/subscribe`.
#[derive(Clone)]
pub struct LndRestSource {
    base_url: String,
    macaroon_hex: String,
    client: reqwest::Client,
}

impl LndRestSource {
    /// Read the macaroon and certificate and build the HTTP client.
    pub fn new(config: &LndConfig) -> Result<Self> {
        let macaroon = std::fs::read(&config.macaroon_path)
            .with_context(|| format!("Failed to read macaroon {}", config.macaroon_path.display()))?;

        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(30));
        if let Some(path) = &config.tls_cert_path {
            builder = builder.add_root_certificate(load_certificate(path)?);
        }
        // No overall timeout: the subscription response never completes.
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: config.rest_url.trim_end_matches('/').to_string(),
            macaroon_hex: hex::encode(macaroon),
            client,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header(MACAROON_HEADER, &self.macaroon_hex)
    }
}

fn load_certificate(path: &Path) -> Result<reqwest::Certificate> {
    let pem = std::fs::read(path)
        .with_context(|| format!("Failed to read TLS certificate {}", path.display()))?;
    reqwest::Certificate::from_pem(&pem).context("Invalid TLS certificate")
}

async fn error_for_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{} failed ({}): {}", what, status, body);
    }
    Ok(response)
}

#[async_trait]
impl TopologySource for LndRestSource {
    async fn pull_graph(&self) -> Result<Graph> {
        let response = self
            .get("/v1/graph")
            .query(&[("include_unannounced", "false")])
            .send()
            .await
            .context("Failed to connect to node REST gateway")?;
        let response = error_for_status(response, "Graph pull").await?;

        let document: SnapshotDocument = response
            .json()
            .await
            .context("Failed to parse graph response")?;
        info!(nodes = document.nodes.len(), channels = document.edges.len(), "Pulled graph");

        Ok(document.into_graph())
    }

    async fn subscribe_topology(&self) -> Result<TopologySubscription> {
        let response = self
            .get("/v1/graph/subscribe")
            .send()
            .await
            .context("Failed to connect to node REST gateway")?;
        let response = error_for_status(response, "Graph subscription").await?;

        let (update_tx, update_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(1);
        let reader = tokio::spawn(read_stream(response, update_tx, error_tx));

        info!("Subscribed to graph topology updates");
        Ok(TopologySubscription::new(update_rx, error_rx).with_reader(reader))
    }
}

/// Forward decoded lines until the stream ends, fails, or the consumer goes away.
///
/// Returning drops both senders, which the consumer observes as the end
/// of the stream.
async fn read_stream(
    response: reqwest::Response,
    updates: mpsc::Sender<TopologyUpdate>,
    errors: mpsc::Sender<anyhow::Error>,
) {
    let mut stream = response.bytes_stream();
    let mut buffer = LineBuffer::default();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = errors
                    .send(anyhow::Error::new(e).context("Graph subscription stream failed"))
                    .await;
                return;
            }
        };
        for line in buffer.push(&chunk) {
            if !forward(&line, &updates, &errors).await {
                return;
            }
        }
    }

    if let Some(line) = buffer.finish() {
        forward(&line, &updates, &errors).await;
    }
    debug!("Graph subscription stream closed");
}

async fn forward(
    line: &[u8],
    updates: &mpsc::Sender<TopologyUpdate>,
    errors: &mpsc::Sender<anyhow::Error>,
) -> bool {
    match parse_stream_line(line) {
        Ok(Some(update)) => updates.send(update).await.is_ok(),
        Ok(None) => true,
        Err(e) => {
            warn!(error = %e, "Graph subscription reported an error");
            let _ = errors.send(e).await;
            false
        }
    }
}
