//! spotfeed — multi-source DX spot ingestion and aggregation.
//!
//! Consumes spot reports from DX cluster nodes (line-oriented telnet
//! protocol), the Reverse Beacon Network, the PSK Reporter service
//! (HTTP/XML) and replay files, and maintains a de-duplicated, expiring
//! picture of which station is active on which frequency. Near-duplicate
//! entities caused by mis-copied callsigns are reconciled on a periodic
//! cleanup tick; every tick publishes an immutable, frequency-sorted
//! snapshot to subscribers.
//!
//! ```no_run
//! use spotfeed::feed::SpotFeedBuilder;
//! use spotfeed::model::SourceId;
//! use spotfeed::source::cluster::ClusterEndpoint;
//!
//! # async fn demo() {
//! let feed = SpotFeedBuilder::new()
//!     .cluster(ClusterEndpoint::new("dxc.example.net", 7300, "W1AW", SourceId("dxc".into())))
//!     .build()
//!     .unwrap();
//!
//! let mut snapshots = feed.subscribe();
//! while let Ok(snapshot) = snapshots.recv().await {
//!     for dx in snapshot.iter() {
//!         println!("{} on {:.1} kHz ({} sources)", dx.call, dx.freq_khz, dx.source_count());
//!     }
//! }
//! # }
//! ```

pub mod aggregator;
pub mod callsign;
pub mod feed;
pub mod grid;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod source;

pub use feed::{SpotFeed, SpotFeedBuilder, SpotFeedError};
pub use model::{DxSpot, Spot, SpotPayload, SpotSnapshot};
