//! Reroute Advisor host
//!
//! Acts as the external scheduler for the reroute engine: loads telemetry
//! snapshots from disk, replays them one tick at a time, and collects the
//! per-tick reports plus final ledger statistics.

use fabric_reroute::{RerouteError, RerouteStatistics, TickReport};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod loader;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid engine configuration: {0}")]
    Config(#[from] RerouteError),
    #[error("No snapshots found")]
    NoSnapshots,
}

pub type Result<T> = std::result::Result<T, LoaderError>;

/// Output document for one replay run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub ticks: Vec<TickReport>,
    pub statistics: RerouteStatistics,
}
