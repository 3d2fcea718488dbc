//! Snapshot and configuration loading from JSON files

use crate::{LoaderError, Result};
use fabric_reroute::{EngineConfig, FabricLink, TopologySnapshot};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Accepted snapshot file layouts
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Ticks { ticks: Vec<TopologySnapshot> },
    Many(Vec<TopologySnapshot>),
    One(TopologySnapshot),
}

fn is_valid_ratio(pct: f64) -> bool {
    (0.0..=100.0).contains(&pct) && pct.is_finite()
}

fn is_valid_magnitude(value: f64) -> bool {
    value >= 0.0 && value.is_finite()
}

/// Metrics must be finite, non-negative, and percentages within 0-100
fn is_valid_link(link: &FabricLink) -> bool {
    is_valid_magnitude(link.latency_ms)
        && is_valid_magnitude(link.bandwidth_gbps)
        && is_valid_ratio(link.utilization_pct)
        && is_valid_ratio(link.error_rate_pct)
}

/// Drop links with out-of-range metrics. Returns how many were dropped.
pub fn sanitize_snapshot(snapshot: &mut TopologySnapshot) -> usize {
    let before = snapshot.links.len();
    snapshot.links.retain(|link| {
        let valid = is_valid_link(link);
        if !valid {
            warn!(link_id = %link.id, "dropping link with out-of-range metrics");
        }
        valid
    });
    before - snapshot.links.len()
}

/// Load one or more snapshots from a JSON file
///
/// The file may hold a single snapshot, an array of snapshots, or an
/// object with a `ticks` array.
pub fn load_snapshots(path: impl AsRef<Path>) -> Result<Vec<TopologySnapshot>> {
    let path = path.as_ref();
    info!("Loading snapshots from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let parsed: SnapshotFile = serde_json::from_reader(reader)?;

    let mut snapshots = match parsed {
        SnapshotFile::Ticks { ticks } => ticks,
        SnapshotFile::Many(many) => many,
        SnapshotFile::One(one) => vec![one],
    };

    if snapshots.is_empty() {
        return Err(LoaderError::NoSnapshots);
    }

    let skipped: usize = snapshots.iter_mut().map(sanitize_snapshot).sum();

    info!(
        "Loaded {} snapshots ({} links skipped for invalid metrics)",
        snapshots.len(),
        skipped
    );

    Ok(snapshots)
}

/// Load and validate an engine configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    info!("Loading engine config from {:?}", path);

    let file = File::open(path)?;
    let config: EngineConfig = serde_json::from_reader(BufReader::new(file))?;
    config.validate()?;

    Ok(config)
}
