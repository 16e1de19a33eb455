//! Callsign parsing and validation.
//!
//! A callsign is decomposed into up to four `/`-separated components:
//! an optional secondary prefix, the base call, an optional suffix, and an
//! optional working condition (`P`, `A`, `M`, `MM`, `AM`). The base call
//! follows the structural grammar "optional leading character, letter,
//! digit, any alphanumerics, trailing letter" — `W1AW`, `EA5WU`, `4X1AB`.
//!
//! This module knows nothing about DXCC entities; it is purely structural.

use std::fmt;
use std::str::FromStr;

/// Suffixes that denote a working condition rather than a location.
const WORKING_CONDITIONS: &[&str] = &["P", "A", "M", "MM", "AM"];

/// A structurally valid amateur radio callsign.
///
/// Equality and hashing cover all components, so `DL/W1AW` and `W1AW` are
/// distinct calls while two parses of the same text are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Callsign {
    prefix: Option<String>,
    base: String,
    suffix: Option<String>,
    working_condition: Option<String>,
}

/// Error returned when a string does not parse as a callsign.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid callsign: {0:?}")]
pub struct InvalidCallsign(pub String);

impl Callsign {
    /// The base component, e.g. `W1AW` for `DL/W1AW/P`.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The secondary prefix, e.g. `DL` for `DL/W1AW`.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The suffix component, e.g. `7` for `W1AW/7`.
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// The working condition, e.g. `P` for `W1AW/P`.
    pub fn working_condition(&self) -> Option<&str> {
        self.working_condition.as_deref()
    }
}

impl FromStr for Callsign {
    type Err = InvalidCallsign;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let upper = raw.trim().to_ascii_uppercase();
        let invalid = || InvalidCallsign(raw.to_string());

        let segments: Vec<&str> = upper.split('/').collect();
        if segments.len() > 4 || segments.iter().any(|s| s.is_empty()) {
            return Err(invalid());
        }
        if !segments
            .iter()
            .all(|s| s.bytes().all(|b| b.is_ascii_alphanumeric()))
        {
            return Err(invalid());
        }

        // The base call is the first segment that matches the base grammar;
        // at most one segment (the secondary prefix) may precede it.
        let (prefix, base_index) = if is_base_call(segments[0]) {
            (None, 0)
        } else if segments.len() >= 2 && is_base_call(segments[1]) {
            (Some(segments[0].to_string()), 1)
        } else {
            return Err(invalid());
        };

        let trailing = &segments[base_index + 1..];
        let (mut suffix, mut working_condition) = match trailing {
            [] => (None, None),
            [one] => (Some(one.to_string()), None),
            [s, wc] if WORKING_CONDITIONS.contains(wc) => {
                (Some(s.to_string()), Some(wc.to_string()))
            }
            _ => return Err(invalid()),
        };

        // A lone trailing working condition is not a location suffix.
        if working_condition.is_none() {
            if let Some(s) = &suffix {
                if WORKING_CONDITIONS.contains(&s.as_str()) {
                    working_condition = suffix.take();
                }
            }
        }

        Ok(Callsign {
            prefix,
            base: segments[base_index].to_string(),
            suffix,
            working_condition,
        })
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.prefix {
            write!(f, "{p}/")?;
        }
        f.write_str(&self.base)?;
        if let Some(s) = &self.suffix {
            write!(f, "/{s}")?;
        }
        if let Some(wc) = &self.working_condition {
            write!(f, "/{wc}")?;
        }
        Ok(())
    }
}

/// Whether a string parses as a callsign.
pub fn is_valid_call(raw: &str) -> bool {
    raw.parse::<Callsign>().is_ok()
}

/// Structural check for a base call segment: an optional leading
/// alphanumeric, then letter, digit, any alphanumerics, trailing letter.
fn is_base_call(segment: &str) -> bool {
    matches_core(segment) || (segment.len() >= 4 && matches_core(&segment[1..]))
}

fn matches_core(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1].is_ascii_digit()
        && bytes[bytes.len() - 1].is_ascii_alphabetic()
        && bytes.iter().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(s: &str) -> Callsign {
        s.parse().unwrap()
    }

    // -----------------------------------------------------------------------
    // Accepted shapes
    // -----------------------------------------------------------------------

    #[test]
    fn plain_call() {
        let c = call("W1AW");
        assert_eq!(c.base(), "W1AW");
        assert!(c.prefix().is_none());
        assert!(c.suffix().is_none());
        assert!(c.working_condition().is_none());
    }

    #[test]
    fn lowercase_normalized() {
        assert_eq!(call("w1aw"), call("W1AW"));
    }

    #[test]
    fn leading_digit_call() {
        assert_eq!(call("4X1AB").base(), "4X1AB");
    }

    #[test]
    fn double_letter_prefix_call() {
        assert_eq!(call("EA5WU").base(), "EA5WU");
        assert_eq!(call("AA1BB").base(), "AA1BB");
    }

    #[test]
    fn special_event_call() {
        assert_eq!(call("EI55WAW").base(), "EI55WAW");
    }

    #[test]
    fn secondary_prefix() {
        let c = call("DL/W1AW");
        assert_eq!(c.prefix(), Some("DL"));
        assert_eq!(c.base(), "W1AW");
    }

    #[test]
    fn district_suffix() {
        let c = call("W1AW/7");
        assert_eq!(c.base(), "W1AW");
        assert_eq!(c.suffix(), Some("7"));
        assert!(c.working_condition().is_none());
    }

    #[test]
    fn working_condition_promoted_from_suffix() {
        let c = call("VE3NEA/P");
        assert_eq!(c.base(), "VE3NEA");
        assert!(c.suffix().is_none());
        assert_eq!(c.working_condition(), Some("P"));
    }

    #[test]
    fn prefix_suffix_and_working_condition() {
        let c = call("DL/W1AW/7/MM");
        assert_eq!(c.prefix(), Some("DL"));
        assert_eq!(c.base(), "W1AW");
        assert_eq!(c.suffix(), Some("7"));
        assert_eq!(c.working_condition(), Some("MM"));
    }

    #[test]
    fn display_round_trip() {
        for s in ["W1AW", "DL/W1AW", "W1AW/7", "VE3NEA/P", "DL/W1AW/7/MM"] {
            assert_eq!(call(s).to_string(), s);
        }
    }

    // -----------------------------------------------------------------------
    // Rejected shapes
    // -----------------------------------------------------------------------

    #[test]
    fn rejects_garbage() {
        for s in ["", "/", "W1AW/", "/W1AW", "14025.0", "DX", "W-1AW", "ABC", "A1", "1234"] {
            assert!(!is_valid_call(s), "{s:?} should be invalid");
        }
    }

    #[test]
    fn rejects_too_many_segments() {
        assert!(!is_valid_call("DL/W1AW/7/P/X"));
    }

    #[test]
    fn rejects_second_trailing_segment_that_is_no_working_condition() {
        assert!(!is_valid_call("W1AW/7/QRZ"));
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    #[test]
    fn equality_covers_all_components() {
        assert_eq!(call("W1AW"), call("W1AW"));
        assert_ne!(call("W1AW"), call("DL/W1AW"));
        assert_ne!(call("W1AW"), call("W1AW/P"));
    }

    #[test]
    fn usable_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(call("AA1BB"), 1);
        assert_eq!(map.get(&call("aa1bb")), Some(&1));
        assert_eq!(map.get(&call("AA2BB")), None);
    }
}
