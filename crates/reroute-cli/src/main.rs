//! Reroute Advisor CLI
//!
//! Replays fabric telemetry snapshots through the reroute engine, one tick
//! per snapshot.
//!
//! Usage:
//!   reroute-advisor --snapshots data/diamond_ticks.json \
//!                   --config data/engine_config.json \
//!                   --commit --output data/replay_report.json

use anyhow::{Context, Result};
use clap::Parser;
use fabric_reroute::{RerouteEngine, SharedEngine};
use reroute_cli::{loader, ReplaySummary};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "reroute-advisor",
    about = "Replay fabric telemetry through the adaptive reroute engine"
)]
struct Args {
    /// Snapshot JSON file (single snapshot, array, or {"ticks": [...]})
    #[arg(short, long, default_value = "data/diamond_ticks.json")]
    snapshots: PathBuf,

    /// Engine configuration JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the maximum hop count
    #[arg(long)]
    max_hops: Option<usize>,

    /// Commit every suggestion as it is produced
    #[arg(long)]
    commit: bool,

    /// Pace ticks on a fixed interval instead of replaying back to back
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Output JSON file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean JSON
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => loader::load_config(path)
            .with_context(|| format!("loading config from {:?}", path))?,
        None => Default::default(),
    };
    if let Some(max_hops) = args.max_hops {
        config.max_hops = max_hops;
    }

    let snapshots = loader::load_snapshots(&args.snapshots)
        .with_context(|| format!("loading snapshots from {:?}", args.snapshots))?;

    let engine = SharedEngine::new(RerouteEngine::new(config)?);
    let mut ticker = args
        .interval_ms
        .map(|ms| tokio::time::interval(Duration::from_millis(ms.max(1))));

    let mut ticks = Vec::with_capacity(snapshots.len());
    for snapshot in &snapshots {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }
        ticks.push(engine.tick(snapshot, args.commit));
    }

    let summary = ReplaySummary {
        ticks,
        statistics: engine.statistics(),
    };

    info!(
        "Replayed {} ticks, {} reroutes committed",
        summary.ticks.len(),
        summary.statistics.total_count
    );
    for (reason, count) in &summary.statistics.reason_histogram {
        info!("  {}: {}", reason, count);
    }

    match &args.output {
        Some(path) => {
            info!("Writing report to {:?}", path);
            let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &summary)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, &summary)?;
            writeln!(writer)?;
        }
    }

    Ok(())
}
