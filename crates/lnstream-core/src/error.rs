//! Centralized error types for ln-stream.

use thiserror::Error;

/// Main error type for sync operations.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Graph pull failed: {0}")]
    Pull(String),

    #[error("Subscription failed: {0}")]
    Subscribe(String),

    #[error("Graph store error: {0}")]
    Store(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for sync operations.
pub type StreamResult<T> = Result<T, StreamError>;

impl StreamError {
    /// Create a not-configured error.
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an invalid record error.
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Whether the caller asked for something the process cannot do
    /// (as opposed to something that failed while doing it).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured(_))
    }
}
