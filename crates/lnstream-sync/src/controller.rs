//! Sync lifecycle controller.
//!
//! One lock guards the running flag and the cancellation handle, and is
//! held for the full duration of every control operation. At most one
//! live update loop exists per `Running` period, and every activation
//! gets a fresh cancellation signal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lnstream_core::{SnapshotDocument, StreamError, StreamResult, TopologySource};
use lnstream_graph::import::{pull, snapshot};
use lnstream_graph::post_import::run_post_import;
use lnstream_graph::schema::drop_all;
use lnstream_graph::{GraphStore, ImportReport};
use serde::Serialize;
use tokio::sync::{oneshot, watch, Mutex};
use tracing::{info, warn};

use crate::live::{run_update_loop, LoopExit};

/// Upper bound on a full graph pull.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Upper bound on establishing the live subscription.
pub const DEFAULT_SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Controller settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Snapshot document loaded by [`SyncController::load_snapshot`].
    pub snapshot_path: PathBuf,
    /// Run the post-import step after a full reload.
    pub post_process: bool,
    pub pull_timeout: Duration,
    /// Bounds `start` so a stalled source cannot hold the control lock.
    pub subscribe_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("./describegraph.json"),
            post_process: true,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
            subscribe_timeout: DEFAULT_SUBSCRIBE_TIMEOUT,
        }
    }
}

/// Externally observable lifecycle status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub running: bool,
    /// Number of `Stopped -> Running` transitions so far.
    pub generation: u64,
    pub since: Option<DateTime<Utc>>,
}

enum Phase {
    Stopped,
    Running {
        cancel: oneshot::Sender<()>,
        since: DateTime<Utc>,
    },
}

struct SyncState {
    generation: u64,
    phase: Phase,
}

impl SyncState {
    fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    fn status(&self) -> SyncStatus {
        SyncStatus {
            running: self.is_running(),
            generation: self.generation,
            since: match &self.phase {
                Phase::Running { since, .. } => Some(*since),
                Phase::Stopped => None,
            },
        }
    }
}

struct Inner {
    store: Arc<dyn GraphStore>,
    source: Option<Arc<dyn TopologySource>>,
    config: ControllerConfig,
    state: Mutex<SyncState>,
    running_tx: watch::Sender<bool>,
}

impl Inner {
    fn source(&self) -> StreamResult<Arc<dyn TopologySource>> {
        self.source
            .clone()
            .ok_or_else(|| StreamError::not_configured("no upstream topology source configured"))
    }

    /// Fire the cancellation signal and flip to `Stopped`. Caller holds the lock.
    ///
    /// Does not wait for the loop to exit.
    fn stop_locked(&self, state: &mut SyncState) -> bool {
        match std::mem::replace(&mut state.phase, Phase::Stopped) {
            Phase::Running { cancel, .. } => {
                let _ = cancel.send(());
                self.running_tx.send_replace(false);
                info!(generation = state.generation, "Live updates stopped");
                true
            }
            Phase::Stopped => false,
        }
    }

    /// Revert to `Stopped` after the loop of `generation` died on its own.
    ///
    /// A loop from an older activation never stops a newer one.
    async fn revert(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation == generation && state.is_running() {
            state.phase = Phase::Stopped;
            self.running_tx.send_replace(false);
            warn!(generation, "Live updates stopped by upstream failure");
        }
    }

    async fn post_process(&self) -> StreamResult<()> {
        if self.config.post_process {
            run_post_import(self.store.as_ref()).await?;
        }
        Ok(())
    }
}

/// Serializes every control operation over the sync state.
#[derive(Clone)]
pub struct SyncController {
    inner: Arc<Inner>,
}

impl SyncController {
    /// Create a controller in the `Stopped` state.
    ///
    /// Without a `source` only snapshot loading is available.
    pub fn new(
        store: Arc<dyn GraphStore>,
        source: Option<Arc<dyn TopologySource>>,
        config: ControllerConfig,
    ) -> Self {
        let (running_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                store,
                source,
                config,
                state: Mutex::new(SyncState {
                    generation: 0,
                    phase: Phase::Stopped,
                }),
                running_tx,
            }),
        }
    }

    /// Whether live operations (reset, live updates) are available.
    pub fn has_source(&self) -> bool {
        self.inner.source.is_some()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Observe running-flag changes, including upstream-triggered stops.
    pub fn watch_running(&self) -> watch::Receiver<bool> {
        self.inner.running_tx.subscribe()
    }

    /// Current status. Waits only on the lock, never on the loop.
    pub async fn status(&self) -> SyncStatus {
        self.inner.state.lock().await.status()
    }

    /// Start live updates. Returns the new running flag.
    ///
    /// Reports success only once the subscription is established. If
    /// already running this is a no-op.
    pub async fn start(&self) -> StreamResult<bool> {
        let mut state = self.inner.state.lock().await;
        self.start_locked(&mut state).await?;
        Ok(true)
    }

    /// Stop live updates. Returns the new running flag.
    pub async fn stop(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        self.inner.stop_locked(&mut state);
        false
    }

    /// Start if stopped, stop if running. Returns the new running flag.
    pub async fn toggle(&self) -> StreamResult<bool> {
        let mut state = self.inner.state.lock().await;
        self.inner.source()?;
        if state.is_running() {
            self.inner.stop_locked(&mut state);
            Ok(false)
        } else {
            self.start_locked(&mut state).await?;
            Ok(true)
        }
    }

    async fn start_locked(&self, state: &mut SyncState) -> StreamResult<()> {
        let source = self.inner.source()?;
        if state.is_running() {
            info!(generation = state.generation, "Live updates already running");
            return Ok(());
        }

        let timeout = self.inner.config.subscribe_timeout;
        let subscription = tokio::time::timeout(timeout, source.subscribe_topology())
            .await
            .map_err(|_| StreamError::Subscribe(format!("timed out after {:?}", timeout)))?
            .map_err(|e| StreamError::Subscribe(format!("{:#}", e)))?;

        let (cancel, cancel_rx) = oneshot::channel();
        state.generation += 1;
        state.phase = Phase::Running {
            cancel,
            since: Utc::now(),
        };
        self.inner.running_tx.send_replace(true);

        let generation = state.generation;
        let inner = self.inner.clone();
        tokio::spawn(async move {
            match run_update_loop(inner.store.clone(), subscription, cancel_rx).await {
                LoopExit::Cancelled => {}
                LoopExit::StreamError(e) => {
                    warn!(generation, error = %format!("{:#}", e), "Error receiving graph update");
                    inner.revert(generation).await;
                }
                LoopExit::StreamEnded => {
                    warn!(generation, "Graph update stream ended");
                    inner.revert(generation).await;
                }
            }
        });

        info!(generation, "Live updates started");
        Ok(())
    }

    /// Stop live updates, pull a fresh graph, then drop and repopulate the store.
    ///
    /// The pull happens before the drop so a failed pull leaves the store
    /// as it was.
    pub async fn reset_from_live(&self) -> StreamResult<ImportReport> {
        let mut state = self.inner.state.lock().await;
        let source = self.inner.source()?;

        info!("Graph reset initiated...");
        self.inner.stop_locked(&mut state);

        info!("Pulling graph...");
        let timeout = self.inner.config.pull_timeout;
        let graph = tokio::time::timeout(timeout, source.pull_graph())
            .await
            .map_err(|_| StreamError::Pull(format!("timed out after {}s", timeout.as_secs())))?
            .map_err(|e| StreamError::Pull(format!("{:#}", e)))?;

        drop_all(self.inner.store.as_ref())
            .await
            .map_err(|e| StreamError::store(format!("{:#}", e)))?;

        let report = pull::write_graph(self.inner.store.as_ref(), &graph).await;
        self.inner.post_process().await?;

        info!(nodes = report.nodes_written, edges = report.edges_written, "Graph reset complete");
        Ok(report)
    }

    /// Load the configured snapshot file.
    pub async fn load_snapshot(&self) -> StreamResult<ImportReport> {
        let path = self.inner.config.snapshot_path.clone();
        self.load_snapshot_from(&path).await
    }

    /// Stop live updates, then drop the store and load `path` into it.
    ///
    /// The file is parsed before the drop; an unreadable or corrupt file
    /// leaves the store untouched.
    pub async fn load_snapshot_from(&self, path: &Path) -> StreamResult<ImportReport> {
        let mut state = self.inner.state.lock().await;

        info!(path = %path.display(), "Snapshot load initiated...");
        self.inner.stop_locked(&mut state);

        let owned = path.to_path_buf();
        let doc = tokio::task::spawn_blocking(move || SnapshotDocument::from_path(&owned))
            .await
            .map_err(|e| StreamError::Snapshot(format!("snapshot reader failed: {}", e)))??;

        drop_all(self.inner.store.as_ref())
            .await
            .map_err(|e| StreamError::store(format!("{:#}", e)))?;

        let report = snapshot::write_snapshot(self.inner.store.as_ref(), &doc).await?;
        self.inner.post_process().await?;

        info!(nodes = report.nodes_written, edges = report.edges_written, "Snapshot load complete");
        Ok(report)
    }

    /// Stop live updates on process shutdown.
    pub async fn shutdown(&self) {
        self.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use lnstream_core::{
        ChannelEdge, ChannelId, Graph, Node, NodeUpdate, RoutingPolicy, TopologySubscription, TopologyUpdate,
    };
    use lnstream_graph::testing::RecordingStore;
    use tokio::sync::mpsc;

    const DROP: &str = "MATCH (n) DETACH DELETE n";

    type Feed = (mpsc::Sender<TopologyUpdate>, mpsc::Sender<anyhow::Error>);

    #[derive(Default)]
    struct ScriptedSource {
        fail_pull: AtomicBool,
        fail_subscribe: AtomicBool,
        hang_subscribe: AtomicBool,
        subscribe_calls: AtomicUsize,
        feeds: StdMutex<Vec<Feed>>,
    }

    impl ScriptedSource {
        fn feed(&self, index: usize) -> Feed {
            self.feeds.lock().unwrap()[index].clone()
        }

        fn subscribe_calls(&self) -> usize {
            self.subscribe_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TopologySource for ScriptedSource {
        async fn pull_graph(&self) -> anyhow::Result<Graph> {
            if self.fail_pull.load(Ordering::SeqCst) {
                anyhow::bail!("describe graph failed");
            }
            Ok(Graph {
                nodes: vec![
                    Node { pub_key: "02aa".to_string(), ..Default::default() },
                    Node { pub_key: "03bb".to_string(), ..Default::default() },
                ],
                edges: vec![ChannelEdge {
                    channel_id: ChannelId(1 << 40),
                    chan_point: String::new(),
                    capacity: 100_000,
                    node1_pub: "02aa".to_string(),
                    node2_pub: "03bb".to_string(),
                    node1_policy: Some(RoutingPolicy::default()),
                    node2_policy: Some(RoutingPolicy::default()),
                }],
            })
        }

        async fn subscribe_topology(&self) -> anyhow::Result<TopologySubscription> {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_subscribe.load(Ordering::SeqCst) {
                anyhow::bail!("subscribe graph failed");
            }
            if self.hang_subscribe.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            let (update_tx, update_rx) = mpsc::channel(16);
            let (error_tx, error_rx) = mpsc::channel(1);
            self.feeds.lock().unwrap().push((update_tx, error_tx));
            Ok(TopologySubscription::new(update_rx, error_rx))
        }
    }

    fn setup(config: ControllerConfig) -> (SyncController, Arc<RecordingStore>, Arc<ScriptedSource>) {
        let store = Arc::new(RecordingStore::new());
        let source = Arc::new(ScriptedSource::default());
        let controller = SyncController::new(store.clone(), Some(source.clone()), config);
        (controller, store, source)
    }

    async fn wait_until_closed(feed: &Feed) {
        tokio::time::timeout(Duration::from_secs(5), feed.0.closed())
            .await
            .expect("update loop did not exit");
    }

    async fn wait_for_stopped(controller: &SyncController) {
        let mut running = controller.watch_running();
        tokio::time::timeout(Duration::from_secs(5), running.wait_for(|r| !*r))
            .await
            .expect("controller did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_requires_source() {
        let store = Arc::new(RecordingStore::new());
        let controller = SyncController::new(store, None, ControllerConfig::default());
        assert!(matches!(controller.start().await, Err(StreamError::NotConfigured(_))));
        assert!(matches!(controller.toggle().await, Err(StreamError::NotConfigured(_))));
        assert!(matches!(controller.reset_from_live().await, Err(StreamError::NotConfigured(_))));
        assert!(!controller.status().await.running);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (controller, _, source) = setup(ControllerConfig::default());
        assert!(controller.start().await.unwrap());
        assert!(controller.start().await.unwrap());
        assert_eq!(source.subscribe_calls(), 1);

        let status = controller.status().await;
        assert!(status.running);
        assert_eq!(status.generation, 1);
        assert!(status.since.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_starts_spawn_one_loop() {
        let (controller, _, source) = setup(ControllerConfig::default());
        let (a, b) = tokio::join!(controller.start(), controller.start());
        assert!(a.unwrap() && b.unwrap());
        assert_eq!(source.subscribe_calls(), 1);
        assert_eq!(controller.status().await.generation, 1);
    }

    #[tokio::test]
    async fn test_subscribe_failure_leaves_stopped() {
        let (controller, _, source) = setup(ControllerConfig::default());
        source.fail_subscribe.store(true, Ordering::SeqCst);

        assert!(matches!(controller.start().await, Err(StreamError::Subscribe(_))));
        let status = controller.status().await;
        assert!(!status.running);
        assert_eq!(status.generation, 0);

        source.fail_subscribe.store(false, Ordering::SeqCst);
        assert!(controller.start().await.unwrap());
    }

    #[tokio::test]
    async fn test_stalled_subscribe_times_out_and_releases_lock() {
        let config = ControllerConfig {
            subscribe_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let (controller, _, source) = setup(config);
        source.hang_subscribe.store(true, Ordering::SeqCst);

        match controller.start().await {
            Err(StreamError::Subscribe(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected subscribe timeout, got {:?}", other),
        }
        let status = tokio::time::timeout(Duration::from_secs(5), controller.status())
            .await
            .expect("control lock still held");
        assert!(!status.running);
        assert_eq!(status.generation, 0);

        assert!(matches!(controller.toggle().await, Err(StreamError::Subscribe(_))));
        source.hang_subscribe.store(false, Ordering::SeqCst);
        assert!(controller.start().await.unwrap());
        assert_eq!(source.subscribe_calls(), 3);
    }

    #[tokio::test]
    async fn test_toggle_uses_fresh_subscription_each_time() {
        let (controller, _, source) = setup(ControllerConfig::default());
        assert!(controller.toggle().await.unwrap());
        assert!(!controller.toggle().await.unwrap());
        wait_until_closed(&source.feed(0)).await;

        assert!(controller.toggle().await.unwrap());
        assert_eq!(source.subscribe_calls(), 2);
        assert_eq!(controller.status().await.generation, 2);
        assert!(!source.feed(1).0.is_closed());
    }

    #[tokio::test]
    async fn test_loop_applies_updates() {
        let (controller, store, source) = setup(ControllerConfig::default());
        controller.start().await.unwrap();

        let update = TopologyUpdate {
            node_updates: vec![NodeUpdate { identity_key: "02aa".to_string(), ..Default::default() }],
            ..Default::default()
        };
        source.feed(0).0.send(update).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while store.statements().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("update was not applied");
        assert_eq!(store.statements()[0].get("pubKey"), Some(&serde_json::json!("02aa")));
    }

    #[tokio::test]
    async fn test_stream_error_reverts_to_stopped() {
        let (controller, _, source) = setup(ControllerConfig::default());
        controller.start().await.unwrap();

        source.feed(0).1.send(anyhow::anyhow!("stream reset")).await.unwrap();
        wait_for_stopped(&controller).await;
        assert!(!controller.status().await.running);

        assert!(controller.start().await.unwrap());
        assert_eq!(controller.status().await.generation, 2);
    }

    #[tokio::test]
    async fn test_stream_end_reverts_to_stopped() {
        let (controller, _, source) = setup(ControllerConfig::default());
        controller.start().await.unwrap();

        source.feeds.lock().unwrap().clear();
        wait_for_stopped(&controller).await;
    }

    #[tokio::test]
    async fn test_stale_loop_does_not_stop_newer_activation() {
        let (controller, _, _) = setup(ControllerConfig::default());
        controller.start().await.unwrap();
        controller.stop().await;
        controller.start().await.unwrap();

        controller.inner.revert(1).await;
        let status = controller.status().await;
        assert!(status.running);
        assert_eq!(status.generation, 2);
    }

    #[tokio::test]
    async fn test_reset_while_running_stops_loop_first() {
        let (controller, store, source) = setup(ControllerConfig::default());
        controller.start().await.unwrap();

        let report = controller.reset_from_live().await.unwrap();
        assert!(!controller.status().await.running);
        wait_until_closed(&source.feed(0)).await;

        assert_eq!(report.nodes_written, 2);
        assert_eq!(report.edges_written, 2);
        let texts = store.texts();
        let drop_at = texts.iter().position(|t| t == DROP).unwrap();
        let first_merge = texts.iter().position(|t| t.contains("MERGE")).unwrap();
        assert!(drop_at < first_merge);
        assert!(store.count_matching("betweenness_centrality") > 0);
    }

    #[tokio::test]
    async fn test_pull_failure_leaves_store_untouched() {
        let (controller, store, source) = setup(ControllerConfig::default());
        source.fail_pull.store(true, Ordering::SeqCst);

        assert!(matches!(controller.reset_from_live().await, Err(StreamError::Pull(_))));
        assert_eq!(store.count_matching(DROP), 0);
    }

    #[tokio::test]
    async fn test_load_snapshot_stops_loop_and_imports() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"nodes": [{{"pub_key": "02aa"}}, {{"pub_key": "03bb"}}],
                "edges": [{{"channel_id": "1", "capacity": "10", "node1_pub": "02aa", "node2_pub": "03bb",
                            "node1_policy": {{"max_htlc_msat": "9"}}, "node2_policy": null}}]}}"#
        )
        .unwrap();

        let config = ControllerConfig {
            snapshot_path: file.path().to_path_buf(),
            post_process: false,
            ..Default::default()
        };
        let (controller, store, _) = setup(config);
        controller.start().await.unwrap();

        let report = controller.load_snapshot().await.unwrap();
        assert!(!controller.status().await.running);
        assert_eq!(report.nodes_written, 2);
        assert_eq!(report.edges_written, 1);
        assert_eq!(store.count_matching(DROP), 1);
        assert_eq!(store.count_matching("betweenness_centrality"), 0);
    }

    #[tokio::test]
    async fn test_missing_snapshot_does_not_drop() {
        let config = ControllerConfig {
            snapshot_path: PathBuf::from("/nonexistent/describegraph.json"),
            ..Default::default()
        };
        let (controller, store, _) = setup(config);

        assert!(matches!(controller.load_snapshot().await, Err(StreamError::Snapshot(_))));
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_load_works_without_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"nodes": [], "edges": []}}"#).unwrap();

        let store = Arc::new(RecordingStore::new());
        let controller = SyncController::new(store.clone(), None, ControllerConfig::default());
        let report = controller.load_snapshot_from(file.path()).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(store.count_matching(DROP), 1);
    }
}
