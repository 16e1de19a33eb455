//! Spot source workers.
//!
//! Each source runs as its own tokio task, emitting [`SourceMessage`]s into
//! the aggregator's channel, and stops cooperatively via a
//! `CancellationToken`. The core never reconnects a failed source; callers
//! may start a new feed for that endpoint.

pub mod cluster;
pub mod pskreporter;
pub mod replay;

use crate::model::{SourceStatus, Spot};

/// Messages sent from a source worker to the aggregator.
pub enum SourceMessage {
    /// A parsed spot observation ready for aggregation.
    Spot(Spot),
    /// Connection state change.
    Status(SourceStatus),
}

/// Errors from source workers.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("read timeout (inactivity)")]
    ReadTimeout,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("channel closed")]
    ChannelClosed,
    #[error("shutdown requested")]
    Shutdown,
}
