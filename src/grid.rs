//! Maidenhead grid locator newtype.
//!
//! Only validation and normalization — no coordinate math. Spots are tagged
//! with the observer's locator when the source provides one.

use std::fmt;
use std::str::FromStr;

/// A validated Maidenhead locator: a field pair (`A`–`R`), a square pair
/// (digits), and an optional subsquare pair (`a`–`x`). Stored normalized
/// as e.g. `JN12` or `JO57vo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Locator(String);

/// Error returned when a string is not a valid locator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid grid locator: {0:?}")]
pub struct InvalidLocator(pub String);

impl Locator {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The field pair, e.g. `JO` for `JO57vo`.
    pub fn field(&self) -> &str {
        &self.0[..2]
    }
}

impl FromStr for Locator {
    type Err = InvalidLocator;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        if s.len() != 4 && s.len() != 6 {
            return Err(InvalidLocator(raw.to_string()));
        }

        let bytes = s.as_bytes();
        let field_ok = bytes[..2]
            .iter()
            .all(|b| matches!(b.to_ascii_uppercase(), b'A'..=b'R'));
        let square_ok = bytes[2..4].iter().all(|b| b.is_ascii_digit());
        let subsquare_ok = bytes[4..]
            .iter()
            .all(|b| matches!(b.to_ascii_lowercase(), b'a'..=b'x'));

        if !(field_ok && square_ok && subsquare_ok) {
            return Err(InvalidLocator(raw.to_string()));
        }

        let mut normalized = String::with_capacity(s.len());
        normalized.push_str(&s[..2].to_ascii_uppercase());
        normalized.push_str(&s[2..4]);
        normalized.push_str(&s[4..].to_ascii_lowercase());
        Ok(Locator(normalized))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a string parses as a locator.
pub fn is_valid_locator(raw: &str) -> bool {
    raw.parse::<Locator>().is_ok()
}
