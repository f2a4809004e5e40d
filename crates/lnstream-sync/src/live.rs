//! The liveness loop: consume a topology subscription until cancelled.

use std::sync::Arc;

use lnstream_core::TopologySubscription;
use lnstream_graph::{apply_update, GraphStore};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Why the loop returned.
#[derive(Debug)]
pub enum LoopExit {
    /// The cancellation signal fired (or its sender was dropped).
    Cancelled,
    /// The upstream reported an error.
    StreamError(anyhow::Error),
    /// The upstream closed the update stream.
    StreamEnded,
}

/// Apply updates from `subscription` until cancelled or the stream fails.
///
/// Messages are applied one at a time in delivery order. Cancellation is
/// checked before each wait, so a stop takes effect once the message in
/// flight (if any) has been written.
pub async fn run_update_loop(
    store: Arc<dyn GraphStore>,
    mut subscription: TopologySubscription,
    mut cancel: oneshot::Receiver<()>,
) -> LoopExit {
    info!("Subscribed to graph topology updates. Waiting for updates...");
    let mut errors_open = true;

    loop {
        let (updates, errors) = subscription.channels();
        tokio::select! {
            biased;

            _ = &mut cancel => {
                info!("Stopping graph update loop");
                return LoopExit::Cancelled;
            }
            update = updates.recv() => match update {
                Some(update) => {
                    debug!(events = update.len(), "Received topology update");
                    apply_update(store.as_ref(), &update).await;
                }
                None => return LoopExit::StreamEnded,
            },
            error = errors.recv(), if errors_open => match error {
                Some(e) => return LoopExit::StreamError(e),
                None => errors_open = false,
            },
        }
    }
}
