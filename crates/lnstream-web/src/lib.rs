//! ln-stream web server
//!
//! Axum-based JSON control surface over the sync controller.

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use lnstream_sync::SyncController;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/toggle-updates", get(routes::sync::toggle_updates))
        .route("/reset-graph", get(routes::sync::reset_graph))
        .route("/load-local-snapshot", get(routes::sync::load_local_snapshot))
        .route("/get-status", get(routes::sync::get_status))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the web server until the process receives Ctrl-C.
pub async fn run_server(controller: SyncController, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(AppState::new(controller.clone()));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("Web server listening on http://{}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    controller.shutdown().await;
    tracing::info!("Web server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use lnstream_graph::testing::RecordingStore;
    use lnstream_sync::ControllerConfig;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(snapshot_path: PathBuf) -> (Router, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::new());
        let config = ControllerConfig {
            snapshot_path,
            post_process: false,
            ..Default::default()
        };
        let controller = SyncController::new(store.clone(), None, config);
        (create_router(AppState::new(controller)), store)
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_status_when_stopped() {
        let (router, _) = app(PathBuf::from("unused.json"));
        let (status, body) = get(router, "/get-status").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["isRoutineRunning"], Value::Bool(false));
        assert!(json["since"].is_null());
    }

    #[tokio::test]
    async fn test_live_routes_without_source_are_bad_requests() {
        for uri in ["/toggle-updates", "/reset-graph"] {
            let (router, store) = app(PathBuf::from("unused.json"));
            let (status, body) = get(router, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            let json: Value = serde_json::from_slice(&body).unwrap();
            assert!(json["error"].as_str().unwrap().contains("Not configured"));
            assert!(store.statements().is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_server_error() {
        let (router, store) = app(PathBuf::from("/nonexistent/describegraph.json"));
        let (status, body) = get(router, "/load-local-snapshot").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("failed to open snapshot"));
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_load_succeeds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"nodes":[{"pub_key":"02aa"}],"edges":[]}"#).unwrap();

        let (router, store) = app(file.path().to_path_buf());
        let (status, body) = get(router, "/load-local-snapshot").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Snapshot load complete.");
        assert_eq!(store.count_matching("MATCH (n) DETACH DELETE n"), 1);
        assert_eq!(store.count_matching("MERGE (n:node {pubkey: $pubKey})"), 1);
    }
}
