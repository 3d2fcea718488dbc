//! Tick orchestration
//!
//! `RerouteEngine` owns the per-tick pipeline and every piece of mutable
//! state: the topology, the route cache, the active-route table and the
//! ledger. `SharedEngine` serializes whole ticks for concurrent hosts.

use crate::advisor::{RerouteAdvisor, RerouteDecision, RouteStore};
use crate::catalog::{Route, RouteCatalog};
use crate::config::EngineConfig;
use crate::ledger::{RerouteLedger, RerouteStatistics};
use crate::scanner::{self, Bottleneck, BottleneckScanner, NetworkHealthReport};
use crate::scorer::RouteScorer;
use crate::telemetry::TopologySnapshot;
use crate::topology::{GraphStats, TopologyGraph, UpdateReport};
use crate::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything one tick produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub generation: u64,
    pub captured_at: DateTime<Utc>,
    pub update: UpdateReport,
    pub health: NetworkHealthReport,
    pub graph_stats: GraphStats,
    pub suggestions: Vec<RerouteDecision>,
    pub committed: usize,
    pub rejected: usize,
}

pub struct RerouteEngine {
    config: EngineConfig,
    graph: TopologyGraph,
    catalog: RouteCatalog,
    advisor: RerouteAdvisor,
    store: RouteStore,
    ledger: RerouteLedger,
}

impl RerouteEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let scorer = RouteScorer::new(config.weights.clone(), config.max_hops);
        Ok(Self {
            catalog: RouteCatalog::new(scorer),
            advisor: RerouteAdvisor::new(config.congestion_margin),
            graph: TopologyGraph::new(),
            store: RouteStore::new(),
            ledger: RerouteLedger::new(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    pub fn ledger(&self) -> &RerouteLedger {
        &self.ledger
    }

    pub fn active_routes(&self) -> &RouteStore {
        &self.store
    }

    pub fn active_route(&self, source: &str, target: &str) -> Option<&Route> {
        self.store.get(source, target)
    }

    /// Replace the topology with a fresh snapshot and drop cached routes
    pub fn update_topology(&mut self, snapshot: &TopologySnapshot) -> UpdateReport {
        let report = self.graph.update(&snapshot.nodes, &snapshot.links);
        self.catalog.invalidate();
        report
    }

    pub fn graph_stats(&self) -> GraphStats {
        self.graph.stats()
    }

    pub fn bottlenecks(&self) -> Vec<Bottleneck> {
        BottleneckScanner::scan(&self.graph, &self.config.thresholds)
    }

    pub fn health(&self) -> NetworkHealthReport {
        scanner::analyze_health(&self.graph, &self.config.thresholds)
    }

    pub fn find_routes(&mut self, source: &str, target: &str) -> Vec<Route> {
        self.catalog.find_routes(&self.graph, source, target)
    }

    /// Pending suggestions for the current topology
    pub fn suggest_reroutes(&mut self) -> Vec<RerouteDecision> {
        let bottlenecks = self.bottlenecks();
        self.advisor
            .suggest(&self.graph, &mut self.catalog, &bottlenecks, &self.store)
    }

    pub fn commit(&mut self, decision: &RerouteDecision) -> Result<()> {
        self.advisor
            .commit(&self.graph, &mut self.store, &mut self.ledger, decision)
    }

    /// Commit one suggestion; `false` if it was rejected
    pub fn execute_reroute(&mut self, decision: &RerouteDecision) -> bool {
        match self.commit(decision) {
            Ok(()) => true,
            Err(e) => {
                warn!(decision = %decision.id, error = %e, "failed to execute reroute");
                false
            }
        }
    }

    pub fn statistics(&self) -> RerouteStatistics {
        self.ledger.statistics(self.config.recent_decisions)
    }

    /// Full pipeline: rebuild, scan, suggest, then optionally commit every
    /// suggestion once all of them have been computed.
    pub fn run_tick(&mut self, snapshot: &TopologySnapshot, auto_commit: bool) -> TickReport {
        let update = self.update_topology(snapshot);
        let health = self.health();
        let graph_stats = self.graph_stats();
        let suggestions = self.suggest_reroutes();

        let mut committed = 0;
        let mut rejected = 0;
        if auto_commit {
            for decision in &suggestions {
                if self.execute_reroute(decision) {
                    committed += 1;
                } else {
                    rejected += 1;
                }
            }
        }

        info!(
            generation = update.generation,
            bottlenecks = health.bottlenecks.len(),
            suggestions = suggestions.len(),
            committed,
            "tick complete"
        );

        TickReport {
            generation: update.generation,
            captured_at: snapshot.captured_at,
            update,
            health,
            graph_stats,
            suggestions,
            committed,
            rejected,
        }
    }
}

/// Engine handle for concurrent hosts
///
/// A tick holds the lock from topology rebuild through commit, so two
/// ticks never interleave.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<RerouteEngine>>,
}

impl SharedEngine {
    pub fn new(engine: RerouteEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn tick(&self, snapshot: &TopologySnapshot, auto_commit: bool) -> TickReport {
        self.inner.lock().run_tick(snapshot, auto_commit)
    }

    pub fn execute_reroute(&self, decision: &RerouteDecision) -> bool {
        self.inner.lock().execute_reroute(decision)
    }

    pub fn statistics(&self) -> RerouteStatistics {
        self.inner.lock().statistics()
    }

    pub fn with_engine<R>(&self, f: impl FnOnce(&mut RerouteEngine) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{FabricLink, FabricNode, HealthStatus, NodeKind};
    use std::thread;

    fn snapshot(ring_util: f64) -> TopologySnapshot {
        let nodes = (0..4)
            .map(|i| FabricNode::new(format!("n{}", i), NodeKind::Switch))
            .collect();
        let links = (0..4)
            .map(|i| {
                FabricLink::new(
                    format!("r{}", i),
                    format!("n{}", i),
                    format!("n{}", (i + 1) % 4),
                    1.0,
                    100.0,
                )
                .with_utilization(ring_util)
            })
            .collect();
        TopologySnapshot::new(nodes, links)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            max_hops: 0,
            ..EngineConfig::default()
        };
        assert!(RerouteEngine::new(config).is_err());
    }

    #[test]
    fn test_quiet_tick_suggests_nothing() {
        let mut engine = RerouteEngine::new(EngineConfig::default()).unwrap();
        let report = engine.run_tick(&snapshot(10.0), true);

        assert_eq!(report.generation, 1);
        assert_eq!(report.graph_stats.total_nodes, 4);
        assert_eq!(report.graph_stats.traversable_links, 4);
        assert!(report.health.bottlenecks.is_empty());
        assert!(report.suggestions.is_empty());
        assert_eq!(engine.statistics().total_count, 0);
    }

    #[test]
    fn test_empty_topology_is_not_an_error() {
        let mut engine = RerouteEngine::new(EngineConfig::default()).unwrap();
        let report = engine.run_tick(&TopologySnapshot::new(Vec::new(), Vec::new()), true);

        assert!(report.suggestions.is_empty());
        assert!(engine.find_routes("a", "b").is_empty());
    }

    #[test]
    fn test_stale_suggestion_fails_to_execute() {
        let mut engine = RerouteEngine::new(EngineConfig::default()).unwrap();
        let mut snap = snapshot(10.0);
        snap.links[0].status = HealthStatus::Failed;

        let report = engine.run_tick(&snap, false);
        assert_eq!(report.suggestions.len(), 1);
        assert_eq!(report.graph_stats.total_links, 4);
        assert_eq!(report.graph_stats.traversable_links, 3);
        assert_eq!(engine.graph_stats().generation, report.generation);

        engine.update_topology(&snap);
        assert!(!engine.execute_reroute(&report.suggestions[0]));
        assert!(engine.active_routes().is_empty());
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_shared_engine_serializes_ticks() {
        let shared = SharedEngine::new(RerouteEngine::new(EngineConfig::default()).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    let mut snap = snapshot(10.0);
                    snap.links[i].status = HealthStatus::Failed;
                    shared.tick(&snap, true)
                })
            })
            .collect();

        let mut generations: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().generation)
            .collect();
        generations.sort();
        assert_eq!(generations, vec![1, 2, 3, 4]);

        let ledger_len = shared.with_engine(|e| e.ledger().len());
        assert_eq!(shared.statistics().total_count, ledger_len);
    }
}
