//! Route handlers.

pub mod sync;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lnstream_core::StreamError;
use serde_json::json;

/// A controller failure rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub StreamError);

impl From<StreamError> for ApiError {
    fn from(err: StreamError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_configuration() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
