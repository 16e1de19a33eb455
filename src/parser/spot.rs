//! DX spot line parser for cluster and beacon network feeds.
//!
//! The spot grammar, shared by DXSpider, AR-Cluster, CC Cluster and the
//! Reverse Beacon Network, is:
//!
//! ```text
//! DX de SP-CALL:    FREQ.F  DX-CALL  comment            HHMMz [GRID]
//! ```
//!
//! Column positions vary between cluster implementations, so the parser
//! works token-wise rather than by column. A secondary grammar over the
//! comment (`MODE SNR dB SPEED WPM|BPS INFO`) detects skimmer-generated
//! spots and upgrades them to [`SpotPayload::Beacon`].
//!
//! The parser is a pure function of the line text and never panics on any
//! input. Lines that do not match the grammar, or whose callsigns fail
//! validation, yield `None` and are dropped by the caller.

use chrono::{DateTime, Utc};

use crate::callsign::Callsign;
use crate::grid::Locator;
use crate::model::{SpeedUnit, Spot, SpotPayload};

/// Parse a single feed line into a spot observation.
///
/// `received_at` becomes the observation timestamp; the HHMM time printed
/// on the line is only checked structurally (clusters disagree on clock
/// skew, so arrival time is what expiry is based on).
pub fn parse_spot_line(line: &str, received_at: DateTime<Utc>) -> Option<Spot> {
    let trimmed = line.trim_end();

    // "DX de " prefix, case-insensitive
    let after_prefix = if trimmed.len() >= 6 && trimmed[..6].eq_ignore_ascii_case("DX de ") {
        trimmed[6..].trim_start()
    } else {
        return None;
    };

    // Observer call: runs up to the colon when one is glued on, otherwise
    // up to the first whitespace. A skimmer tag ("-#", "-1") is stripped.
    let ws = after_prefix
        .find(char::is_whitespace)
        .unwrap_or(after_prefix.len());
    let (observer_raw, rest) = match after_prefix.find(':') {
        Some(c) if c <= ws => (&after_prefix[..c], &after_prefix[c + 1..]),
        _ => (&after_prefix[..ws], &after_prefix[ws..]),
    };
    let observer_raw = match observer_raw.find('-') {
        Some(p) => &observer_raw[..p],
        None => observer_raw,
    };
    let source_call: Callsign = observer_raw.parse().ok()?;

    // Frequency in kHz
    let rest = rest.trim_start();
    let freq_end = rest.find(char::is_whitespace)?;
    let freq_hz = parse_freq_khz_to_hz(&rest[..freq_end])?;

    // DX call
    let rest = rest[freq_end..].trim_start();
    let call_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let call: Callsign = rest[..call_end].parse().ok()?;

    // Comment, mandatory HHMMz time, optional trailing grid
    let (comment, source_grid) = split_comment_time_grid(rest[call_end..].trim())?;

    let payload = parse_beacon_comment(comment)
        .unwrap_or_else(|| SpotPayload::Cluster {
            comment: comment.to_string(),
        });

    Some(Spot {
        call,
        freq_hz,
        timestamp: received_at,
        source_call: Some(source_call),
        source_grid,
        source_country: None,
        payload,
    })
}

/// Parse a kHz frequency string directly to Hz as `u64`.
///
/// Handles "14025.0", "14025.12", "7001" — integer and fractional parts are
/// parsed separately to avoid f64 rounding.
fn parse_freq_khz_to_hz(s: &str) -> Option<u64> {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let khz: u64 = int_part.parse().ok()?;
    let mut hz = khz.checked_mul(1_000)?;

    if !frac_part.is_empty() {
        // Only Hz precision matters; ".1" = 100 Hz, ".12" = 120 Hz.
        let digits: String = frac_part.chars().take(3).collect();
        let scale = match digits.len() {
            1 => 100,
            2 => 10,
            _ => 1,
        };
        hz = hz.checked_add(digits.parse::<u64>().ok()? * scale)?;
    }

    Some(hz)
}

/// Split the tail of a spot line into comment text, the mandatory time
/// token, and an optional trailing grid locator. Returns `None` when the
/// time token is missing.
fn split_comment_time_grid(rest: &str) -> Option<(&str, Option<Locator>)> {
    let rest = rest.trim();
    let (head, last) = rsplit_token(rest)?;

    if is_time_token(last) {
        return Some((head.trim(), None));
    }

    // Not a time: the only thing allowed after the time is a grid locator.
    let grid: Locator = last.parse().ok()?;
    let (head, prev) = rsplit_token(head.trim_end())?;
    if is_time_token(prev) {
        Some((head.trim(), Some(grid)))
    } else {
        None
    }
}

/// Split off the last whitespace-delimited token: `(head, token)`.
fn rsplit_token(s: &str) -> Option<(&str, &str)> {
    if s.is_empty() {
        return None;
    }
    match s.rfind(char::is_whitespace) {
        Some(i) => {
            let token = s[i..].trim_start();
            Some((&s[..i], token))
        }
        None => Some(("", s)),
    }
}

/// `HHMM` followed by `Z` or `z`, checked structurally.
fn is_time_token(s: &str) -> bool {
    s.len() == 5
        && s.as_bytes()[..4].iter().all(|b| b.is_ascii_digit())
        && (s.ends_with('Z') || s.ends_with('z'))
}

/// Try the beacon network comment grammar: `MODE SNR dB SPEED WPM|BPS INFO`.
///
/// Returns `None` when the comment is ordinary free text, in which case the
/// spot stays a cluster spot.
fn parse_beacon_comment(comment: &str) -> Option<SpotPayload> {
    let tokens: Vec<&str> = comment.split_whitespace().collect();
    if tokens.len() < 5 {
        return None;
    }

    let mode = tokens[0];
    if !mode
        .bytes()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    {
        return None;
    }

    if !tokens[1].bytes().all(|b| b.is_ascii_digit()) || !tokens[2].eq_ignore_ascii_case("dB") {
        return None;
    }
    let snr_db: i16 = tokens[1].parse().ok()?;

    if !tokens[3].bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let speed: u16 = tokens[3].parse().ok()?;

    let speed_unit = match tokens[4] {
        "WPM" => SpeedUnit::Wpm,
        "BPS" => SpeedUnit::Bps,
        _ => return None,
    };

    Some(SpotPayload::Beacon {
        mode: mode.to_string(),
        snr_db,
        speed,
        speed_unit,
        info: tokens[5..].join(" "),
    })
}
