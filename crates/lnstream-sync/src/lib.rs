//! # ln-stream sync
//!
//! The sync lifecycle controller: bulk reloads (from a live pull or a
//! snapshot file) and the start/stop state machine of the live update
//! loop, all serialized through one lock.

pub mod controller;
pub mod live;

pub use controller::{
    ControllerConfig, SyncController, SyncStatus, DEFAULT_PULL_TIMEOUT, DEFAULT_SUBSCRIBE_TIMEOUT,
};
pub use live::LoopExit;
