//! Core data model: individual spot observations and aggregated DX spots.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::callsign::Callsign;
use crate::grid::Locator;
use crate::resolver::CountryInfo;

// ---------------------------------------------------------------------------
// TTL constants
// ---------------------------------------------------------------------------

/// How long a manually reported cluster spot remains valid.
pub const CLUSTER_SPOT_TTL: Duration = Duration::from_secs(300);
/// How long an automated skimmer (beacon network) spot remains valid.
pub const BEACON_SPOT_TTL: Duration = Duration::from_secs(60);
/// How long a PSK Reporter reception report remains valid.
pub const REPORTED_SPOT_TTL: Duration = Duration::from_secs(600);

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifies an upstream connection (e.g., a specific cluster node).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceId(pub String);

// ---------------------------------------------------------------------------
// Spot — a single observation
// ---------------------------------------------------------------------------

/// Keying speed unit for beacon network spots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpeedUnit {
    /// Words per minute (CW).
    Wpm,
    /// Bits per second (digital modes).
    Bps,
}

/// Producer-specific payload of a spot observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpotPayload {
    /// A manually reported cluster spot with its free-text comment.
    Cluster { comment: String },
    /// An automated skimmer spot with the decoded comment fields.
    Beacon {
        mode: String,
        snr_db: i16,
        speed: u16,
        speed_unit: SpeedUnit,
        info: String,
    },
    /// A reception report from the PSK Reporter service.
    Reported { mode: String, snr_db: i16 },
}

/// A single observation of a station, as reported by one observer.
///
/// Immutable once constructed; the aggregator attaches `source_country`
/// by rebuilding the value, not by mutating it.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Spot {
    /// The station that was heard.
    pub call: Callsign,
    /// Exact frequency in Hz, parsed without floating point rounding.
    pub freq_hz: u64,
    /// When the observation was made (or received).
    pub timestamp: DateTime<Utc>,
    /// The observing station, when known.
    pub source_call: Option<Callsign>,
    /// The observer's grid locator, when reported.
    pub source_grid: Option<Locator>,
    /// Resolved by the aggregator, not the parser. Not part of identity.
    pub source_country: Option<CountryInfo>,
    pub payload: SpotPayload,
}

impl Spot {
    /// Frequency in kHz.
    pub fn freq_khz(&self) -> f64 {
        self.freq_hz as f64 / 1_000.0
    }

    /// Validity period, fixed per producer kind.
    pub fn ttl(&self) -> Duration {
        match self.payload {
            SpotPayload::Cluster { .. } => CLUSTER_SPOT_TTL,
            SpotPayload::Beacon { .. } => BEACON_SPOT_TTL,
            SpotPayload::Reported { .. } => REPORTED_SPOT_TTL,
        }
    }

    /// Absolute time at which this observation stops being valid.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.timestamp + chrono::Duration::seconds(self.ttl().as_secs() as i64)
    }

    /// Returns the same observation with the resolved observer country.
    pub fn with_source_country(self, country: Option<CountryInfo>) -> Self {
        Self {
            source_country: country,
            ..self
        }
    }
}

// Identity covers observer, call, frequency, timestamp and payload; the
// lazily resolved country enrichment is excluded so that the same report
// observed before and after resolution deduplicates.
impl PartialEq for Spot {
    fn eq(&self, other: &Self) -> bool {
        self.call == other.call
            && self.freq_hz == other.freq_hz
            && self.timestamp == other.timestamp
            && self.source_call == other.source_call
            && self.source_grid == other.source_grid
            && self.payload == other.payload
    }
}

impl Eq for Spot {}

impl Hash for Spot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.call.hash(state);
        self.freq_hz.hash(state);
        self.timestamp.hash(state);
        self.source_call.hash(state);
        self.source_grid.hash(state);
        self.payload.hash(state);
    }
}

// ---------------------------------------------------------------------------
// DxSpot — the aggregated entity
// ---------------------------------------------------------------------------

/// An active station on a frequency, merged from one or more observations.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DxSpot {
    pub call: Callsign,
    /// Midpoint of the previous aggregate frequency and each merged spot's
    /// frequency. A simple moving average, not a weighted mean; recent
    /// observations dominate by construction. Preserved as-is.
    pub freq_khz: f64,
    /// Resolved once from `call` when the entity is created.
    pub country: Option<CountryInfo>,
    /// Contributing observations, deduplicated by value equality.
    pub sources: HashSet<Spot>,
    /// Max over all sources of `timestamp + ttl`; never decreases.
    pub timeout: DateTime<Utc>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl DxSpot {
    /// Create an entity seeded with a single observation.
    pub fn new(spot: Spot, country: Option<CountryInfo>) -> Self {
        let timeout = spot.expires_at();
        let seen = spot.timestamp;
        let mut sources = HashSet::new();
        let call = spot.call.clone();
        let freq_khz = spot.freq_khz();
        sources.insert(spot);

        Self {
            call,
            freq_khz,
            country,
            sources,
            timeout,
            first_seen: seen,
            last_seen: seen,
        }
    }

    /// Merge one more observation into this entity.
    ///
    /// The frequency midpoint and timestamps are updated even when the
    /// observation is already present by value; only the source set itself
    /// is deduplicated.
    pub fn merge(&mut self, spot: Spot) {
        self.freq_khz = (self.freq_khz + spot.freq_khz()) / 2.0;
        self.timeout = self.timeout.max(spot.expires_at());
        self.first_seen = self.first_seen.min(spot.timestamp);
        self.last_seen = self.last_seen.max(spot.timestamp);
        self.sources.insert(spot);
    }

    /// Fold another entity into this one (near-duplicate call merge).
    /// The winner keeps its call, frequency and country.
    pub fn absorb(&mut self, other: DxSpot) {
        self.timeout = self.timeout.max(other.timeout);
        self.first_seen = self.first_seen.min(other.first_seen);
        self.last_seen = self.last_seen.max(other.last_seen);
        self.sources.extend(other.sources);
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

/// Immutable snapshot of all live spots, sorted by frequency ascending.
/// Published to subscribers on every cleanup tick.
pub type SpotSnapshot = std::sync::Arc<Vec<DxSpot>>;

// ---------------------------------------------------------------------------
// Source status
// ---------------------------------------------------------------------------

/// Connection state change of an upstream source.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceStatus {
    pub source_id: SourceId,
    pub state: SourceConnectionState,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceConnectionState {
    Connecting,
    Connected,
    Failed { reason: String },
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(s: &str) -> Callsign {
        s.parse().unwrap()
    }

    fn beacon_spot(dx: &str, freq_hz: u64, t: DateTime<Utc>, observer: &str) -> Spot {
        Spot {
            call: call(dx),
            freq_hz,
            timestamp: t,
            source_call: Some(call(observer)),
            source_grid: None,
            source_country: None,
            payload: SpotPayload::Beacon {
                mode: "CW".into(),
                snr_db: 14,
                speed: 18,
                speed_unit: SpeedUnit::Wpm,
                info: "CQ".into(),
            },
        }
    }

    #[test]
    fn ttl_is_fixed_per_payload_kind() {
        let t = Utc::now();
        let mut spot = beacon_spot("G4LEM", 14_049_600, t, "EA5WU");
        assert_eq!(spot.ttl(), BEACON_SPOT_TTL);

        spot.payload = SpotPayload::Cluster {
            comment: "cq up".into(),
        };
        assert_eq!(spot.ttl(), CLUSTER_SPOT_TTL);

        spot.payload = SpotPayload::Reported {
            mode: "FT8".into(),
            snr_db: 12,
        };
        assert_eq!(spot.ttl(), REPORTED_SPOT_TTL);
    }

    #[test]
    fn expires_at_adds_ttl_to_timestamp() {
        let t = Utc::now();
        let spot = beacon_spot("G4LEM", 14_049_600, t, "EA5WU");
        assert_eq!(spot.expires_at(), t + chrono::Duration::seconds(60));
    }

    #[test]
    fn country_enrichment_does_not_change_identity() {
        let t = Utc::now();
        let spot = beacon_spot("G4LEM", 14_049_600, t, "EA5WU");
        let enriched = spot.clone().with_source_country(Some(CountryInfo {
            name: "Spain".into(),
            continent: crate::resolver::Continent::EU,
            cq_zone: 14,
            itu_zone: 37,
            lat: 40.0,
            lon: -4.0,
            primary_prefix: "EA".into(),
        }));

        assert_eq!(spot, enriched);

        let mut set = HashSet::new();
        set.insert(spot);
        assert!(!set.insert(enriched), "enriched spot must deduplicate");
    }

    #[test]
    fn different_observer_is_a_different_source() {
        let t = Utc::now();
        let mut set = HashSet::new();
        set.insert(beacon_spot("G4LEM", 14_049_600, t, "EA5WU"));
        assert!(set.insert(beacon_spot("G4LEM", 14_049_600, t, "ON5KQ")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn dx_spot_seeded_from_single_observation() {
        let t = Utc::now();
        let dx = DxSpot::new(beacon_spot("G4LEM", 14_049_600, t, "EA5WU"), None);

        assert_eq!(dx.call, call("G4LEM"));
        assert_eq!(dx.freq_khz, 14_049.6);
        assert_eq!(dx.source_count(), 1);
        assert_eq!(dx.first_seen, t);
        assert_eq!(dx.last_seen, t);
        assert_eq!(dx.timeout, t + chrono::Duration::seconds(60));
    }

    #[test]
    fn merge_updates_frequency_midpoint_and_timestamps() {
        let t = Utc::now();
        let mut dx = DxSpot::new(beacon_spot("G4LEM", 14_050_000, t - chrono::Duration::seconds(1), "EA5WU"), None);
        dx.merge(beacon_spot("G4LEM", 14_052_000, t, "ON5KQ"));

        assert_eq!(dx.source_count(), 2);
        assert_eq!(dx.freq_khz, 14_051.0);
        assert_eq!(dx.first_seen, t - chrono::Duration::seconds(1));
        assert_eq!(dx.last_seen, t);
        assert_eq!(dx.timeout, t + chrono::Duration::seconds(60));
    }

    #[test]
    fn merge_never_decreases_timeout() {
        let t = Utc::now();
        let mut dx = DxSpot::new(beacon_spot("G4LEM", 14_050_000, t, "EA5WU"), None);
        let timeout_before = dx.timeout;

        // An older observation must not pull the timeout back.
        dx.merge(beacon_spot("G4LEM", 14_050_000, t - chrono::Duration::seconds(30), "ON5KQ"));
        assert_eq!(dx.timeout, timeout_before);
        assert_eq!(dx.first_seen, t - chrono::Duration::seconds(30));
    }

    #[test]
    fn absorb_folds_sources_and_extends_timeout() {
        let t = Utc::now();
        let mut winner = DxSpot::new(beacon_spot("AA2BB", 7_040_000, t, "CT2XY"), None);
        winner.merge(beacon_spot("AA2BB", 7_040_000, t, "CT3XY"));

        let mut loser = DxSpot::new(beacon_spot("AA1BB", 7_040_000, t + chrono::Duration::seconds(5), "CT1XY"), None);
        loser.merge(beacon_spot("AA1BB", 7_040_000, t, "CT4XY"));

        let loser_timeout = loser.timeout;
        winner.absorb(loser);

        assert_eq!(winner.call, call("AA2BB"));
        assert_eq!(winner.source_count(), 4);
        assert_eq!(winner.timeout, loser_timeout);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn spot_serde_round_trip() {
        let t = Utc::now();
        let spot = beacon_spot("G4LEM", 14_049_600, t, "EA5WU");
        let json = serde_json::to_string(&spot).unwrap();
        let back: Spot = serde_json::from_str(&json).unwrap();
        assert_eq!(spot, back);
    }
}
