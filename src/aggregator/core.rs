//! Aggregator core: merges raw observations into canonical DX spots.
//! Synchronous state machine — no async here; the feed runs it inside a
//! single task, so `receive` and `cleanup_tick` never interleave.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use strsim::levenshtein;
use tracing::debug;

use crate::callsign::Callsign;
use crate::model::{DxSpot, Spot};
use crate::resolver::DxccResolver;

/// Two observations of the same call within this window describe the same
/// station; the same window bounds the near-duplicate sweep.
pub const FREQUENCY_WINDOW_KHZ: f64 = 10.0;

/// Maximum edit distance between base calls for the near-duplicate merge.
const MAX_CALL_EDIT_DISTANCE: usize = 1;

// ---------------------------------------------------------------------------
// SpotAggregator
// ---------------------------------------------------------------------------

/// Owns the canonical spot state: active entities keyed by call, each call
/// possibly active on several well-separated frequencies.
pub struct SpotAggregator {
    spots: HashMap<Callsign, Vec<DxSpot>>,
    resolver: Box<dyn DxccResolver>,
}

impl SpotAggregator {
    pub fn new(resolver: Box<dyn DxccResolver>) -> Self {
        Self {
            spots: HashMap::new(),
            resolver,
        }
    }

    /// Process one incoming observation.
    ///
    /// The observer's country is resolved best-effort first; then the spot
    /// either merges into an existing entity of the same call within
    /// [`FREQUENCY_WINDOW_KHZ`], or seeds a new one.
    pub fn receive(&mut self, spot: Spot) {
        let source_country = spot
            .source_call
            .as_ref()
            .and_then(|call| self.resolver.resolve(call));
        let spot = spot.with_source_country(source_country);

        let entries = self.spots.entry(spot.call.clone()).or_default();
        match entries
            .iter_mut()
            .find(|dx| (dx.freq_khz - spot.freq_khz()).abs() <= FREQUENCY_WINDOW_KHZ)
        {
            Some(existing) => existing.merge(spot),
            None => {
                let country = self.resolver.resolve(&spot.call);
                entries.push(DxSpot::new(spot, country));
            }
        }
    }

    /// Periodic maintenance: expire, merge near-duplicates, and return the
    /// frequency-sorted snapshot that replaces the internal state.
    pub fn cleanup_tick(&mut self, now: DateTime<Utc>) -> Vec<DxSpot> {
        // Expire and flatten into one frequency-sorted list
        let mut live: Vec<DxSpot> = self
            .spots
            .drain()
            .flat_map(|(_, entries)| entries)
            .filter(|dx| now <= dx.timeout)
            .collect();
        live.sort_by(|a, b| compare_freq(a, b));

        let mut merged = fuzzy_merge(live);
        merged.sort_by(|a, b| compare_freq(a, b));

        // Regroup under the surviving calls
        for dx in &merged {
            self.spots
                .entry(dx.call.clone())
                .or_default()
                .push(dx.clone());
        }

        merged
    }

    /// Total number of live entities across all calls.
    pub fn entity_count(&self) -> usize {
        self.spots.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    /// The live entities for one call, in insertion order.
    pub fn entities_for(&self, call: &Callsign) -> &[DxSpot] {
        self.spots.get(call).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn compare_freq(a: &DxSpot, b: &DxSpot) -> Ordering {
    a.freq_khz
        .partial_cmp(&b.freq_khz)
        .unwrap_or(Ordering::Equal)
}

// ---------------------------------------------------------------------------
// Near-duplicate merge sweep
// ---------------------------------------------------------------------------

/// Sweep a frequency-sorted list, folding together entities whose base
/// calls are within one edit of each other and whose frequencies fall in
/// one window.
///
/// Independent observers regularly mis-copy a single character of the same
/// station's call, producing parallel entities the per-call map cannot
/// reconcile. Bounding the edit-distance comparison to a sliding frequency
/// window keeps the sweep near-linear in the number of live entities.
/// The entity most observers agree on (most accumulated sources, ties to
/// the earlier encounter) keeps its call and frequency.
fn fuzzy_merge(sorted: Vec<DxSpot>) -> Vec<DxSpot> {
    let total = sorted.len();
    let mut slots: Vec<Option<DxSpot>> = sorted.into_iter().map(Some).collect();
    let mut result = Vec::with_capacity(total);

    for seed_index in 0..total {
        let Some(seed) = slots[seed_index].take() else {
            continue;
        };

        // Candidates: still-unconsumed entities inside the seed's window
        // whose base call is within one edit of the seed's.
        let mut matches = Vec::new();
        for candidate_index in (seed_index + 1)..total {
            let Some(candidate) = slots[candidate_index].as_ref() else {
                continue;
            };
            if candidate.freq_khz - seed.freq_khz > FREQUENCY_WINDOW_KHZ {
                break;
            }
            if levenshtein(seed.call.base(), candidate.call.base()) <= MAX_CALL_EDIT_DISTANCE {
                matches.push(candidate_index);
            }
        }

        if matches.is_empty() {
            result.push(seed);
            continue;
        }

        let mut group = Vec::with_capacity(matches.len() + 1);
        group.push(seed);
        for index in matches {
            if let Some(member) = slots[index].take() {
                group.push(member);
            }
        }

        // The reading most observers agree on wins; ties keep the first
        // encountered (lowest frequency) entity.
        let mut winner_index = 0;
        for (index, member) in group.iter().enumerate().skip(1) {
            if member.source_count() > group[winner_index].source_count() {
                winner_index = index;
            }
        }

        let mut winner = group.swap_remove(winner_index);
        for member in group {
            debug!(
                winner = %winner.call,
                absorbed = %member.call,
                freq_khz = winner.freq_khz,
                "merged near-duplicate call"
            );
            winner.absorb(member);
        }
        result.push(winner);
    }

    result
}
