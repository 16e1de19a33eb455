//! DXCC resolver trait and data types.
//!
//! The aggregator consumes this as a best-effort lookup: an unknown call is
//! `None`, never an error. Real implementations (cty.dat, a database, an
//! API) live outside this crate; [`TableDxccResolver`] covers tests and the
//! demo binary.

use crate::callsign::Callsign;

/// ITU continents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Continent {
    AF,
    AN,
    AS,
    EU,
    NA,
    OC,
    SA,
    Unknown,
}

/// Resolved country/entity information for a callsign.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CountryInfo {
    /// Entity name (e.g., "United States", "Japan").
    pub name: String,
    pub continent: Continent,
    pub cq_zone: u8,
    pub itu_zone: u8,
    pub lat: f64,
    pub lon: f64,
    /// Primary DXCC prefix (e.g., "K", "JA").
    pub primary_prefix: String,
}

/// Trait for resolving callsigns to country information.
pub trait DxccResolver: Send + Sync {
    fn resolve(&self, call: &Callsign) -> Option<CountryInfo>;
}

/// Resolver that knows nothing. Spots stay unenriched.
pub struct NullDxccResolver;

impl DxccResolver for NullDxccResolver {
    fn resolve(&self, _call: &Callsign) -> Option<CountryInfo> {
        None
    }
}

/// In-memory longest-prefix-match resolver.
///
/// Matches prefixes against the full callsign text, so `DL/W1AW` resolves
/// via `DL` when both `DL` and `K`/`W` entries exist.
pub struct TableDxccResolver {
    entries: Vec<(String, CountryInfo)>,
}

impl TableDxccResolver {
    pub fn new(entries: Vec<(String, CountryInfo)>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DxccResolver for TableDxccResolver {
    fn resolve(&self, call: &Callsign) -> Option<CountryInfo> {
        let text = call.to_string();
        self.entries
            .iter()
            .filter(|(prefix, _)| text.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, info)| info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(s: &str) -> Callsign {
        s.parse().unwrap()
    }

    fn info(name: &str, prefix: &str, continent: Continent) -> CountryInfo {
        CountryInfo {
            name: name.into(),
            continent,
            cq_zone: 0,
            itu_zone: 0,
            lat: 0.0,
            lon: 0.0,
            primary_prefix: prefix.into(),
        }
    }

    fn table() -> TableDxccResolver {
        TableDxccResolver::new(vec![
            ("W".into(), info("United States", "K", Continent::NA)),
            ("DL".into(), info("Germany", "DL", Continent::EU)),
            ("D".into(), info("Philippines", "DU", Continent::OC)),
            ("EA".into(), info("Spain", "EA", Continent::EU)),
        ])
    }

    #[test]
    fn null_resolver_returns_none() {
        assert!(NullDxccResolver.resolve(&call("W1AW")).is_none());
    }

    #[test]
    fn resolves_by_prefix() {
        let resolver = table();
        assert_eq!(resolver.resolve(&call("W1AW")).unwrap().name, "United States");
        assert_eq!(resolver.resolve(&call("EA5WU")).unwrap().name, "Spain");
    }

    #[test]
    fn longest_prefix_wins() {
        let resolver = table();
        assert_eq!(resolver.resolve(&call("DL1ABC")).unwrap().name, "Germany");
    }

    #[test]
    fn secondary_prefix_drives_resolution() {
        let resolver = table();
        assert_eq!(resolver.resolve(&call("DL/W1AW")).unwrap().name, "Germany");
    }

    #[test]
    fn unknown_call_is_none() {
        assert!(table().resolve(&call("JA1ABC")).is_none());
    }
}
