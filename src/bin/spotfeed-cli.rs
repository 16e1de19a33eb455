//! spotfeed CLI — connect to the configured spot sources and print every
//! snapshot, one line per active station.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spotfeed::feed::SpotFeedBuilder;
use spotfeed::grid::Locator;
use spotfeed::model::{SourceId, SpotSnapshot};
use spotfeed::source::cluster::ClusterEndpoint;
use spotfeed::source::pskreporter::PskReporterConfig;
use spotfeed::source::replay::ReplayConfig;

/// Watch DX spots from clusters, RBN and PSK Reporter.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cluster endpoint as host:port; may be given multiple times
    #[arg(short, long = "cluster")]
    clusters: Vec<String>,

    /// Callsign used for cluster logins
    #[arg(long, env = "SPOTFEED_CALLSIGN", default_value = "N0CALL")]
    callsign: String,

    /// Cluster login password, if any
    #[arg(long, env = "SPOTFEED_PASSWORD")]
    password: Option<String>,

    /// Replay spots from a file instead of (or next to) live sources
    #[arg(long)]
    replay: Option<std::path::PathBuf>,

    /// Own grid locator; enables the PSK Reporter source
    #[arg(long)]
    locator: Option<String>,

    /// Cleanup tick interval in seconds
    #[arg(long, default_value_t = 1)]
    tick_interval: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut builder = SpotFeedBuilder::new().tick_interval(Duration::from_secs(args.tick_interval));

    for (index, spec) in args.clusters.iter().enumerate() {
        let (host, port) = spec
            .rsplit_once(':')
            .with_context(|| format!("cluster spec {spec:?} is not host:port"))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid port in cluster spec {spec:?}"))?;

        let mut endpoint = ClusterEndpoint::new(
            host,
            port,
            args.callsign.clone(),
            SourceId(format!("cluster-{index}")),
        );
        endpoint.password = args.password.clone();
        builder = builder.cluster(endpoint);
    }

    if let Some(path) = &args.replay {
        builder = builder.replay_file(ReplayConfig::new(path, SourceId("replay".into())));
    }

    if let Some(locator) = &args.locator {
        let locator: Locator = locator
            .parse()
            .with_context(|| format!("invalid locator {locator:?}"))?;
        builder = builder.psk_reporter(PskReporterConfig::new(
            locator,
            SourceId("pskreporter".into()),
        ));
    }

    let feed = match builder.build() {
        Ok(feed) => feed,
        Err(e) => bail!("cannot start spotting: {e} (pass --cluster, --replay or --locator)"),
    };

    info!("spotfeed started");
    let mut snapshots = feed.subscribe();

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => {
                match snapshot {
                    Ok(snapshot) => print_snapshot(&snapshot),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    feed.stop().await;
    info!("spotfeed stopped");
    Ok(())
}

fn print_snapshot(snapshot: &SpotSnapshot) {
    if snapshot.is_empty() {
        return;
    }

    let now = Utc::now();
    println!("Spots at {}:", now.format("%H:%M:%SZ"));
    for dx in snapshot.iter() {
        let remaining = (dx.timeout - now).num_seconds().max(0);
        println!(
            "{:<12} on {:>9.1} kHz, timeout in {:>4}s, sources: {:>3}",
            dx.call.to_string(),
            dx.freq_khz,
            remaining,
            dx.source_count()
        );
    }
    println!();
}
