//! Upstream topology source seam.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{Graph, TopologyUpdate};

/// Where topology comes from: a bounded full pull, or a long-lived update feed.
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// Fetch the complete current graph. Callers bound the duration.
    async fn pull_graph(&self) -> Result<Graph>;

    /// Establish a topology update subscription.
    ///
    /// Returning `Ok` means the upstream accepted the subscription.
    async fn subscribe_topology(&self) -> Result<TopologySubscription>;
}

/// An established subscription: an update stream and an error stream.
///
/// Dropping the subscription aborts the task feeding it, if any.
pub struct TopologySubscription {
    updates: mpsc::Receiver<TopologyUpdate>,
    errors: mpsc::Receiver<anyhow::Error>,
    reader: Option<JoinHandle<()>>,
}

impl TopologySubscription {
    pub fn new(updates: mpsc::Receiver<TopologyUpdate>, errors: mpsc::Receiver<anyhow::Error>) -> Self {
        Self {
            updates,
            errors,
            reader: None,
        }
    }

    /// Attach the task producing into this subscription's channels.
    pub fn with_reader(mut self, reader: JoinHandle<()>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Borrow both receivers at once so a consumer can wait on either.
    pub fn channels(
        &mut self,
    ) -> (
        &mut mpsc::Receiver<TopologyUpdate>,
        &mut mpsc::Receiver<anyhow::Error>,
    ) {
        (&mut self.updates, &mut self.errors)
    }
}

impl Drop for TopologySubscription {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
