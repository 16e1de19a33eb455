//! DXCC country resolution (consumed interface).

pub mod dxcc;

pub use dxcc::{Continent, CountryInfo, DxccResolver, NullDxccResolver, TableDxccResolver};
