//! # ln-stream lnd
//!
//! Topology source backed by a Lightning node's REST gateway: a full
//! graph pull over `GET /v1/graph` and a streamed subscription over
//! `GET /v1/graph/subscribe`.

pub mod rest;
pub mod wire;

pub use rest::{LndConfig, LndRestSource};
