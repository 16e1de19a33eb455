//! Replay source: feeds spot lines from a static file, repeatedly.
//!
//! Used for tests and demonstration, not production correctness. The file
//! is re-read on every pass; a fixed per-line delay simulates real-time
//! arrival.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::model::{SourceConnectionState, SourceId, SourceStatus};
use crate::parser::spot::parse_spot_line;

use super::{SourceError, SourceMessage};

/// Configuration for a replay-file source.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub path: PathBuf,
    /// Pause between lines, pacing the simulated arrival.
    pub line_delay: Duration,
    pub source_id: SourceId,
}

impl ReplayConfig {
    pub fn new(path: impl Into<PathBuf>, source_id: SourceId) -> Self {
        Self {
            path: path.into(),
            line_delay: Duration::from_millis(100),
            source_id,
        }
    }
}

/// Run a replay source until cancelled.
///
/// Reads the file once per pass and loops forever; a missing or unreadable
/// file terminates the worker.
pub async fn run_replay_source(
    config: ReplayConfig,
    tx: mpsc::Sender<SourceMessage>,
    shutdown: CancellationToken,
) -> Result<(), SourceError> {
    let _ = tx
        .send(SourceMessage::Status(SourceStatus {
            source_id: config.source_id.clone(),
            state: SourceConnectionState::Connected,
            timestamp: Utc::now(),
        }))
        .await;

    loop {
        let contents = tokio::fs::read_to_string(&config.path).await?;

        for line in contents.lines() {
            if shutdown.is_cancelled() {
                return Err(SourceError::Shutdown);
            }

            match parse_spot_line(line, Utc::now()) {
                Some(spot) => {
                    if tx.send(SourceMessage::Spot(spot)).await.is_err() {
                        return Err(SourceError::ChannelClosed);
                    }
                }
                None => {
                    if !line.trim().is_empty() {
                        debug!(source = %config.source_id.0, line, "dropped unparsed line");
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(config.line_delay) => {}
                _ = shutdown.cancelled() => {
                    return Err(SourceError::Shutdown);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/replay_spots.txt")
    }

    #[tokio::test]
    async fn replays_file_and_loops() {
        let mut config = ReplayConfig::new(fixture_path(), SourceId("replay".into()));
        config.line_delay = Duration::from_millis(1);

        let (tx, mut rx) = mpsc::channel(64);
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(run_replay_source(config, tx, shutdown.clone()));

        // The fixture holds 3 valid spot lines; receiving more than that
        // proves the file is replayed from the start.
        let mut spots = Vec::new();
        while spots.len() < 5 {
            match rx.recv().await {
                Some(SourceMessage::Spot(spot)) => spots.push(spot),
                Some(SourceMessage::Status(_)) => {}
                None => panic!("worker ended before enough spots arrived"),
            }
        }

        shutdown.cancel();
        let result = worker.await.unwrap();
        assert!(matches!(result, Err(SourceError::Shutdown)));

        assert_eq!(spots[0].call.to_string(), "E51DWC");
        assert_eq!(spots[3].call.to_string(), spots[0].call.to_string());
    }

    #[tokio::test]
    async fn missing_file_terminates_worker() {
        let config = ReplayConfig::new("/nonexistent/replay.txt", SourceId("replay".into()));
        let (tx, _rx) = mpsc::channel(8);
        let result = run_replay_source(config, tx, CancellationToken::new()).await;
        assert!(matches!(result, Err(SourceError::Io(_))));
    }
}
