//! Application state.

use lnstream_sync::SyncController;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: SyncController,
}

impl AppState {
    pub fn new(controller: SyncController) -> Self {
        Self { controller }
    }
}
