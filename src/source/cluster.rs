//! DX cluster source worker.
//!
//! Connects to a cluster node over TCP, answers the login handshake, and
//! parses spot lines into observations.
//!
//! Cluster nodes prompt for credentials without a terminating newline
//! ("Please enter your call: "), so the handshake cannot be line-oriented:
//! the worker accumulates raw reads into a buffer, splits off complete
//! lines for parsing, and matches the remaining trailing text against the
//! known prompt endings (`call:`, `login:`, `callsign:`, `password:`).
//! The worker never leaves handshake mode — a node that re-prompts later
//! is answered again.

use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::model::{SourceConnectionState, SourceId, SourceStatus};
use crate::parser::spot::parse_spot_line;

use super::{SourceError, SourceMessage};

/// Prompt endings answered with the configured callsign.
const CALL_PROMPTS: &[&str] = &["call:", "login:", "callsign:"];
/// Prompt ending answered with the configured password.
const PASSWORD_PROMPT: &str = "password:";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for one DX cluster connection.
#[derive(Debug, Clone)]
pub struct ClusterEndpoint {
    pub host: String,
    pub port: u16,
    /// Callsign used to answer the login prompt.
    pub callsign: String,
    /// Password, when the node asks for one. Empty answer otherwise.
    pub password: Option<String>,
    pub source_id: SourceId,
    /// Inactivity timeout: if no data arrives for this duration, the
    /// connection is considered hung and the worker terminates.
    pub read_timeout: Duration,
}

impl ClusterEndpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        callsign: impl Into<String>,
        source_id: SourceId,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            callsign: callsign.into(),
            password: None,
            source_id,
            read_timeout: Duration::from_secs(300),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Run a DX cluster source connection.
///
/// Connects, handles login prompts, reads lines, parses spots, and sends
/// observations on the provided channel. Returns when the server closes the
/// connection, a fatal error occurs, or shutdown is requested.
pub async fn run_cluster_source(
    config: ClusterEndpoint,
    tx: mpsc::Sender<SourceMessage>,
    shutdown: CancellationToken,
) -> Result<(), SourceError> {
    send_status(&tx, &config.source_id, SourceConnectionState::Connecting).await;

    let addr = format!("{}:{}", config.host, config.port);
    let stream = tokio::select! {
        result = TcpStream::connect(&addr) => {
            result.map_err(|e| SourceError::ConnectFailed(e.to_string()))?
        }
        _ = shutdown.cancelled() => {
            return Err(SourceError::Shutdown);
        }
    };

    send_status(&tx, &config.source_id, SourceConnectionState::Connected).await;

    let (mut reader, mut writer) = stream.into_split();
    let mut buffer = String::new();
    let mut chunk = vec![0u8; 1024];

    loop {
        let n = tokio::select! {
            result = reader.read(&mut chunk) => result?,
            _ = tokio::time::sleep(config.read_timeout) => {
                return Err(SourceError::ReadTimeout);
            }
            _ = shutdown.cancelled() => {
                return Err(SourceError::Shutdown);
            }
        };

        if n == 0 {
            // EOF: server disconnected
            return Ok(());
        }

        buffer.push_str(&decode_latin1(&chunk[..n]));

        // Split off complete lines for parsing
        while let Some(pos) = buffer.find('\n') {
            let rest = buffer.split_off(pos + 1);
            let line = std::mem::replace(&mut buffer, rest);
            let line = line.trim_end_matches(['\r', '\n']);

            if line.is_empty() {
                continue;
            }

            match parse_spot_line(line, Utc::now()) {
                Some(spot) => {
                    if tx.send(SourceMessage::Spot(spot)).await.is_err() {
                        return Err(SourceError::ChannelClosed);
                    }
                }
                None => {
                    debug!(source = %config.source_id.0, line, "dropped unparsed line");
                }
            }
        }

        // Handshake: answer prompts sitting at the end of the buffer
        let tail = buffer.trim_end().to_ascii_lowercase();
        if CALL_PROMPTS.iter().any(|p| tail.ends_with(p)) {
            write_credential(&mut writer, &config.callsign).await?;
            buffer.clear();
        } else if tail.ends_with(PASSWORD_PROMPT) {
            let password = config.password.as_deref().unwrap_or("");
            write_credential(&mut writer, password).await?;
            buffer.clear();
        }
    }
}

async fn write_credential(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    value: &str,
) -> Result<(), SourceError> {
    writer.write_all(format!("{value}\r\n").as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

async fn send_status(
    tx: &mpsc::Sender<SourceMessage>,
    source_id: &SourceId,
    state: SourceConnectionState,
) {
    let _ = tx
        .send(SourceMessage::Status(SourceStatus {
            source_id: source_id.clone(),
            state,
            timestamp: Utc::now(),
        }))
        .await;
}

/// Decode bytes as Latin-1 (ISO 8859-1) to a String.
///
/// Latin-1 bytes map directly to Unicode codepoints 0-255, so every byte is
/// valid. Cluster nodes routinely send accented characters in comments.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
