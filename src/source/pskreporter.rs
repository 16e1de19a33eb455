//! PSK Reporter polling source.
//!
//! Periodically queries the retrieval endpoint
//! (<https://www.pskreporter.info/pskdev.html>) and converts the
//! `receptionReport` elements of the XML response into reported spots.
//! A failed or malformed fetch is logged and retried on the next poll;
//! the worker only terminates on shutdown.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::callsign::Callsign;
use crate::grid::Locator;
use crate::model::{SourceConnectionState, SourceId, SourceStatus, Spot, SpotPayload};

use super::{SourceError, SourceMessage};

/// Default retrieval endpoint.
pub const PSKREPORTER_QUERY_URL: &str = "https://retrieve.pskreporter.info/query";

/// Ceiling added to negative SNR values so all reports share one scale.
pub const MAX_SNR_DB: i16 = 30;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the PSK Reporter polling source.
#[derive(Debug, Clone)]
pub struct PskReporterConfig {
    pub base_url: String,
    /// Own station locator; its field pair scopes the query region.
    pub locator: Locator,
    /// How far back each query reaches, in seconds (sent negated).
    pub flow_start_seconds: i64,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub source_id: SourceId,
}

impl PskReporterConfig {
    pub fn new(locator: Locator, source_id: SourceId) -> Self {
        Self {
            base_url: PSKREPORTER_QUERY_URL.into(),
            locator,
            flow_start_seconds: 600,
            poll_interval: Duration::from_secs(240),
            request_timeout: Duration::from_secs(60),
            source_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Run the PSK Reporter polling worker until cancelled.
pub async fn run_pskreporter_source(
    config: PskReporterConfig,
    tx: mpsc::Sender<SourceMessage>,
    shutdown: CancellationToken,
) -> Result<(), SourceError> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| SourceError::Fetch(e.to_string()))?;

    let _ = tx
        .send(SourceMessage::Status(SourceStatus {
            source_id: config.source_id.clone(),
            state: SourceConnectionState::Connected,
            timestamp: Utc::now(),
        }))
        .await;

    loop {
        match fetch_reports(&client, &config).await {
            Ok(spots) => {
                debug!(source = %config.source_id.0, count = spots.len(), "fetched reception reports");
                for spot in spots {
                    if tx.send(SourceMessage::Spot(spot)).await.is_err() {
                        return Err(SourceError::ChannelClosed);
                    }
                }
            }
            Err(e) => {
                warn!(source = %config.source_id.0, error = %e, "reception report fetch failed");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval) => {}
            _ = shutdown.cancelled() => {
                return Err(SourceError::Shutdown);
            }
        }
    }
}

async fn fetch_reports(
    client: &reqwest::Client,
    config: &PskReporterConfig,
) -> Result<Vec<Spot>, SourceError> {
    let flow_start = format!("-{}", config.flow_start_seconds);
    let response = client
        .get(&config.base_url)
        .query(&[
            ("senderCallsign", config.locator.field()),
            ("rronly", "1"),
            ("modify", "grid"),
            ("flowStartSeconds", flow_start.as_str()),
        ])
        .send()
        .await
        .map_err(|e| SourceError::Fetch(e.to_string()))?;

    if !response.status().is_success() {
        return Err(SourceError::Fetch(format!(
            "unexpected status {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| SourceError::Fetch(e.to_string()))?;

    Ok(parse_reception_reports(&body))
}

// ---------------------------------------------------------------------------
// XML parsing
// ---------------------------------------------------------------------------

/// Parse the query response into reported spots.
///
/// Entries with invalid callsigns or locators, or missing mandatory
/// attributes, are skipped; a malformed document yields an empty list.
pub fn parse_reception_reports(xml: &str) -> Vec<Spot> {
    let doc = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "malformed reception report document");
            return Vec::new();
        }
    };

    doc.descendants()
        .filter(|node| node.has_tag_name("receptionReport"))
        .filter_map(|node| reception_report_spot(&node))
        .collect()
}

fn reception_report_spot(node: &roxmltree::Node<'_, '_>) -> Option<Spot> {
    let source_call: Callsign = node.attribute("receiverCallsign")?.parse().ok()?;
    let source_grid: Locator = node.attribute("receiverLocator")?.parse().ok()?;
    let call: Callsign = node.attribute("senderCallsign")?.parse().ok()?;
    let freq_hz: u64 = node.attribute("frequency")?.parse().ok()?;
    let flow_start: i64 = node.attribute("flowStartSeconds")?.parse().ok()?;
    let timestamp: DateTime<Utc> = DateTime::from_timestamp(flow_start, 0)?;

    let mode = node.attribute("mode").unwrap_or_default().to_string();
    let raw_snr = node
        .attribute("sNR")
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let snr_db = normalize_snr(raw_snr);

    Some(Spot {
        call,
        freq_hz,
        timestamp,
        source_call: Some(source_call),
        source_grid: Some(source_grid),
        source_country: None,
        payload: SpotPayload::Reported { mode, snr_db },
    })
}

/// Reports use negative SNR for weak signals; shift those below zero up by
/// the ceiling so all values share one non-negative scale.
fn normalize_snr(snr: f64) -> i16 {
    let normalized = if snr >= 0.0 {
        snr
    } else {
        f64::from(MAX_SNR_DB) + snr
    };
    normalized.round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<receptionReports currentSeconds="1490366400">
  <receptionReport receiverCallsign="SM6FMB" receiverLocator="JO57vo"
      senderCallsign="IK6FAW" senderLocator="JN62SU" frequency="14031000"
      flowStartSeconds="1490366343" mode="CW" isSender="1" sNR="12"/>
  <receptionReport receiverCallsign="CT1XY" receiverLocator="IM58kq"
      senderCallsign="G4LEM" frequency="7040123"
      flowStartSeconds="1490366000" mode="FT8" sNR="-7"/>
</receptionReports>"#;

    #[test]
    fn parses_reception_reports() {
        let spots = parse_reception_reports(SAMPLE);
        assert_eq!(spots.len(), 2);

        let first = &spots[0];
        assert_eq!(first.call.to_string(), "IK6FAW");
        assert_eq!(first.source_call.as_ref().unwrap().to_string(), "SM6FMB");
        assert_eq!(first.source_grid.as_ref().unwrap().as_str(), "JO57vo");
        assert_eq!(first.freq_hz, 14_031_000);
        assert_eq!(first.freq_khz(), 14_031.0);
        assert_eq!(first.timestamp.timestamp(), 1_490_366_343);
        assert_eq!(
            first.payload,
            SpotPayload::Reported {
                mode: "CW".into(),
                snr_db: 12
            }
        );
    }

    #[test]
    fn negative_snr_is_normalized() {
        let spots = parse_reception_reports(SAMPLE);
        assert_eq!(
            spots[1].payload,
            SpotPayload::Reported {
                mode: "FT8".into(),
                snr_db: 23
            }
        );
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let xml = r#"<receptionReports>
  <receptionReport receiverCallsign="!!!" receiverLocator="JO57vo"
      senderCallsign="IK6FAW" frequency="14031000" flowStartSeconds="1490366343"/>
  <receptionReport receiverCallsign="SM6FMB" receiverLocator="nowhere"
      senderCallsign="IK6FAW" frequency="14031000" flowStartSeconds="1490366343"/>
  <receptionReport receiverCallsign="SM6FMB" receiverLocator="JO57vo"
      senderCallsign="IK6FAW" flowStartSeconds="1490366343"/>
  <receptionReport receiverCallsign="SM6FMB" receiverLocator="JO57vo"
      senderCallsign="IK6FAW" frequency="14031000" flowStartSeconds="1490366343"/>
</receptionReports>"#;

        let spots = parse_reception_reports(xml);
        assert_eq!(spots.len(), 1);
    }

    #[test]
    fn missing_snr_defaults_to_zero() {
        let xml = r#"<receptionReports>
  <receptionReport receiverCallsign="SM6FMB" receiverLocator="JO57vo"
      senderCallsign="IK6FAW" frequency="14031000" flowStartSeconds="1490366343"/>
</receptionReports>"#;

        let spots = parse_reception_reports(xml);
        assert_eq!(
            spots[0].payload,
            SpotPayload::Reported {
                mode: "".into(),
                snr_db: 0
            }
        );
    }

    #[test]
    fn malformed_document_yields_nothing() {
        assert!(parse_reception_reports("<not-xml").is_empty());
        assert!(parse_reception_reports("").is_empty());
    }

    #[test]
    fn snr_normalization_boundaries() {
        assert_eq!(normalize_snr(0.0), 0);
        assert_eq!(normalize_snr(12.0), 12);
        assert_eq!(normalize_snr(-1.0), 29);
        assert_eq!(normalize_snr(-30.0), 0);
    }
}
