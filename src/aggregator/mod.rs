//! Spot aggregation.

pub mod core;

pub use core::{SpotAggregator, FREQUENCY_WINDOW_KHZ};
