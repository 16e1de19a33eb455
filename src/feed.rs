//! SpotFeed builder and top-level API.
//!
//! The entry point for consuming applications. Use [`SpotFeedBuilder`] to
//! configure sources and options, then call [`build()`](SpotFeedBuilder::build)
//! to start spotting. The returned [`SpotFeed`] hands out snapshot
//! subscriptions and controls shutdown; [`stop()`](SpotFeed::stop) waits
//! for every worker to terminate, so no spots are delivered after it
//! returns.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregator::SpotAggregator;
use crate::model::{SourceConnectionState, SourceId, SourceStatus, SpotSnapshot};
use crate::resolver::{DxccResolver, NullDxccResolver};
use crate::source::cluster::{run_cluster_source, ClusterEndpoint};
use crate::source::pskreporter::{run_pskreporter_source, PskReporterConfig};
use crate::source::replay::{run_replay_source, ReplayConfig};
use crate::source::{SourceError, SourceMessage};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from building a SpotFeed.
#[derive(Debug, thiserror::Error)]
pub enum SpotFeedError {
    #[error("no sources configured")]
    NoSources,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing a running [`SpotFeed`].
///
/// At minimum one source must be configured; all other options have
/// defaults.
pub struct SpotFeedBuilder {
    clusters: Vec<ClusterEndpoint>,
    replay: Option<ReplayConfig>,
    pskreporter: Option<PskReporterConfig>,
    resolver: Option<Box<dyn DxccResolver>>,
    tick_interval: Duration,
    source_channel_capacity: usize,
    snapshot_channel_capacity: usize,
}

impl Default for SpotFeedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SpotFeedBuilder {
    pub fn new() -> Self {
        Self {
            clusters: Vec::new(),
            replay: None,
            pskreporter: None,
            resolver: None,
            tick_interval: Duration::from_secs(1),
            source_channel_capacity: 256,
            snapshot_channel_capacity: 16,
        }
    }

    /// Add a DX cluster endpoint. May be called repeatedly.
    pub fn cluster(mut self, endpoint: ClusterEndpoint) -> Self {
        self.clusters.push(endpoint);
        self
    }

    /// Add a replay-file source.
    pub fn replay_file(mut self, config: ReplayConfig) -> Self {
        self.replay = Some(config);
        self
    }

    /// Add the PSK Reporter polling source.
    pub fn psk_reporter(mut self, config: PskReporterConfig) -> Self {
        self.pskreporter = Some(config);
        self
    }

    /// Set the DXCC resolver used to enrich spots. Defaults to the null
    /// resolver (no enrichment).
    pub fn resolver(mut self, resolver: Box<dyn DxccResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the interval of the cleanup tick (default: 1 s).
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the capacity of the source-to-aggregator channel.
    pub fn source_channel_capacity(mut self, cap: usize) -> Self {
        self.source_channel_capacity = cap;
        self
    }

    /// Set the capacity of the snapshot broadcast channel.
    pub fn snapshot_channel_capacity(mut self, cap: usize) -> Self {
        self.snapshot_channel_capacity = cap;
        self
    }

    /// Spawn all source workers and the aggregator task.
    pub fn build(self) -> Result<SpotFeed, SpotFeedError> {
        if self.clusters.is_empty() && self.replay.is_none() && self.pskreporter.is_none() {
            return Err(SpotFeedError::NoSources);
        }

        let shutdown = CancellationToken::new();
        let (source_tx, source_rx) = mpsc::channel(self.source_channel_capacity);
        let (snapshot_tx, _) = broadcast::channel(self.snapshot_channel_capacity);

        let mut source_handles = Vec::new();

        for endpoint in self.clusters {
            let source_id = endpoint.source_id.clone();
            source_handles.push(spawn_source(
                "cluster",
                source_id,
                run_cluster_source(endpoint, source_tx.clone(), shutdown.clone()),
                source_tx.clone(),
            ));
        }

        if let Some(config) = self.replay {
            let source_id = config.source_id.clone();
            source_handles.push(spawn_source(
                "replay",
                source_id,
                run_replay_source(config, source_tx.clone(), shutdown.clone()),
                source_tx.clone(),
            ));
        }

        if let Some(config) = self.pskreporter {
            let source_id = config.source_id.clone();
            source_handles.push(spawn_source(
                "pskreporter",
                source_id,
                run_pskreporter_source(config, source_tx.clone(), shutdown.clone()),
                source_tx.clone(),
            ));
        }

        // Drop the builder's copy so the channel closes once every source
        // worker has exited.
        drop(source_tx);

        let resolver = self.resolver.unwrap_or_else(|| Box::new(NullDxccResolver));
        let aggregator_handle = tokio::spawn(run_aggregator_task(
            source_rx,
            snapshot_tx.clone(),
            resolver,
            shutdown.clone(),
            self.tick_interval,
        ));

        Ok(SpotFeed {
            snapshot_tx,
            shutdown,
            source_handles,
            aggregator_handle,
        })
    }
}

/// Spawn one source worker; non-shutdown failures are logged, and a final
/// Stopped status is emitted so consumers see the worker go away.
fn spawn_source<F>(
    kind: &'static str,
    source_id: SourceId,
    worker: F,
    tx: mpsc::Sender<SourceMessage>,
) -> JoinHandle<()>
where
    F: Future<Output = Result<(), SourceError>> + Send + 'static,
{
    tokio::spawn(async move {
        match worker.await {
            Ok(()) | Err(SourceError::Shutdown) => {}
            Err(e) => {
                warn!(source = %source_id.0, kind, error = %e, "spot source terminated");
            }
        }
        let _ = tx
            .send(SourceMessage::Status(SourceStatus {
                source_id,
                state: SourceConnectionState::Stopped,
                timestamp: Utc::now(),
            }))
            .await;
    })
}

// ---------------------------------------------------------------------------
// SpotFeed handle
// ---------------------------------------------------------------------------

/// Handle to a running spot feed.
pub struct SpotFeed {
    snapshot_tx: broadcast::Sender<SpotSnapshot>,
    shutdown: CancellationToken,
    source_handles: Vec<JoinHandle<()>>,
    aggregator_handle: JoinHandle<()>,
}

impl SpotFeed {
    /// Subscribe to the snapshot stream. Every cleanup tick delivers one
    /// frequency-sorted, immutable snapshot to every subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<SpotSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Request shutdown without waiting. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns `true` once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop spotting: signal every worker and wait for all of them, then
    /// the aggregator, to terminate. No spots are delivered after this
    /// returns.
    pub async fn stop(self) {
        self.shutdown.cancel();
        for handle in self.source_handles {
            let _ = handle.await;
        }
        let _ = self.aggregator_handle.await;
    }
}

// ---------------------------------------------------------------------------
// Aggregator task
// ---------------------------------------------------------------------------

/// The single task owning the aggregator state. Incoming observations and
/// the cleanup tick are serialized through one `select!` loop, so
/// `receive` and `cleanup_tick` can never interleave.
async fn run_aggregator_task(
    mut source_rx: mpsc::Receiver<SourceMessage>,
    snapshot_tx: broadcast::Sender<SpotSnapshot>,
    resolver: Box<dyn DxccResolver>,
    shutdown: CancellationToken,
    tick_interval: Duration,
) {
    let mut aggregator = SpotAggregator::new(resolver);
    let mut tick = tokio::time::interval(tick_interval);

    loop {
        tokio::select! {
            msg = source_rx.recv() => {
                match msg {
                    Some(SourceMessage::Spot(spot)) => aggregator.receive(spot),
                    Some(SourceMessage::Status(status)) => {
                        info!(source = %status.source_id.0, state = ?status.state, "source status");
                    }
                    // All source workers have exited
                    None => return,
                }
            }
            _ = tick.tick() => {
                let snapshot: SpotSnapshot = Arc::new(aggregator.cleanup_tick(Utc::now()));
                // No subscribers is fine
                let _ = snapshot_tx.send(snapshot);
            }
            _ = shutdown.cancelled() => {
                return;
            }
        }
    }
}
