//! Fabric Reroute - adaptive path rerouting for compute-fabric interconnects
//!
//! Given a live snapshot of fabric nodes and links, the engine:
//!
//! - Rebuilds a traversable topology from healthy links only
//! - Flags congested or failed links (bottlenecks)
//! - Enumerates bounded-depth alternative paths and scores them
//! - Emits advisory reroute decisions and records committed ones
//!
//! One evaluation tick runs strictly in order:
//!
//! ```text
//! snapshot -> TopologyGraph::update -> BottleneckScanner::scan
//!          -> RouteCatalog::find_routes -> RouteScorer -> RerouteAdvisor
//!          -> commit (active-route table + ledger)
//! ```
//!
//! Decisions are advisory. Nothing here programs a forwarding table.

use thiserror::Error;

pub mod advisor;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod scanner;
pub mod scorer;
pub mod telemetry;
pub mod topology;

pub use advisor::{ExpectedImprovement, RerouteAdvisor, RerouteDecision, RouteStore};
pub use catalog::{Route, RouteCatalog};
pub use config::{BottleneckThresholds, EngineConfig, ScoreWeights};
pub use engine::{RerouteEngine, SharedEngine, TickReport};
pub use ledger::{RerouteLedger, RerouteStatistics};
pub use scanner::{Bottleneck, BottleneckScanner, IssueKind, NetworkHealthReport};
pub use scorer::{RouteQuality, RouteScorer};
pub use telemetry::{FabricLink, FabricNode, HealthStatus, LinkCategory, NodeKind, TopologySnapshot};
pub use topology::{GraphStats, TopologyGraph, UpdateReport};

/// Rerouting errors
///
/// Only contract violations and bad configuration end up here. A missing
/// route or an empty topology is a normal, empty result.
#[derive(Error, Debug)]
pub enum RerouteError {
    #[error("Node not found in current topology: {0}")]
    NodeNotFound(String),
    #[error("Link not traversable in current topology: {0}")]
    LinkNotTraversable(String),
    #[error("Stale decision: produced at generation {produced}, topology is at {current}")]
    StaleDecision { produced: u64, current: u64 },
    #[error("Malformed route: {0}")]
    MalformedRoute(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RerouteError>;
