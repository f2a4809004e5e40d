//! Sync control handlers.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    pub is_routine_running: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_routine_running: bool,
    pub since: Option<DateTime<Utc>>,
}

/// Start live updates if stopped, stop them if running.
pub async fn toggle_updates(State(state): State<AppState>) -> Result<Json<ToggleResponse>, ApiError> {
    let running = state.controller.toggle().await.inspect_err(|e| {
        error!(error = %e, "Toggle failed");
    })?;

    let message = if running { "Routine started." } else { "Routine stopped." };
    Ok(Json(ToggleResponse {
        is_routine_running: running,
        message: message.to_string(),
    }))
}

/// Replace the store contents with a fresh pull from the node.
pub async fn reset_graph(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    let report = state.controller.reset_from_live().await.inspect_err(|e| {
        error!(error = %e, "Graph reset failed");
    })?;
    info!(clean = report.is_clean(), "Graph reset finished");
    Ok("Graph update complete.")
}

/// Replace the store contents with the configured snapshot file.
pub async fn load_local_snapshot(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    let report = state.controller.load_snapshot().await.inspect_err(|e| {
        error!(error = %e, "Snapshot load failed");
    })?;
    info!(clean = report.is_clean(), "Snapshot load finished");
    Ok("Snapshot load complete.")
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.controller.status().await;
    Json(StatusResponse {
        is_routine_running: status.running,
        since: status.since,
    })
}
