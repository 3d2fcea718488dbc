//! Reroute decisions
//!
//! For each bottleneck the advisor picks the node pairs it affects, looks up
//! candidate routes, and gates the best non-active candidate:
//!
//! - no active route for the pair: suggest (first connection)
//! - active route broken, or failure on a link it uses: suggest
//! - otherwise: suggest only if `score(best) > score(active) · margin`
//!
//! The margin keeps near-equal routes from flapping. `commit` is the only
//! writer of the active-route table, and it validates before it mutates.

use crate::catalog::{Route, RouteCatalog};
use crate::ledger::RerouteLedger;
use crate::scanner::{Bottleneck, IssueKind};
use crate::topology::TopologyGraph;
use crate::{RerouteError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

type PairKey = (String, String);

/// Expected change per metric relative to the previous route
///
/// Latency and bandwidth are relative percentages; utilization is the drop
/// in peak utilization, in percentage points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpectedImprovement {
    pub latency_pct: Option<f64>,
    pub bandwidth_pct: Option<f64>,
    pub utilization_pct: Option<f64>,
}

impl ExpectedImprovement {
    pub fn first_connection() -> Self {
        Self {
            latency_pct: Some(100.0),
            bandwidth_pct: Some(100.0),
            utilization_pct: Some(100.0),
        }
    }

    pub fn between(old: &Route, new: &Route) -> Self {
        let latency_pct = (old.total_latency_ms > 0.0).then(|| {
            (old.total_latency_ms - new.total_latency_ms) / old.total_latency_ms * 100.0
        });
        let bandwidth_pct = (old.bottleneck_bandwidth_gbps > 0.0).then(|| {
            (new.bottleneck_bandwidth_gbps - old.bottleneck_bandwidth_gbps)
                / old.bottleneck_bandwidth_gbps
                * 100.0
        });

        Self {
            latency_pct,
            bandwidth_pct,
            utilization_pct: Some(old.peak_utilization_pct - new.peak_utilization_pct),
        }
    }
}

/// A proposed replacement of the active route for a node pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerouteDecision {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Topology generation the decision was computed against
    pub generation: u64,
    pub source_id: String,
    pub target_id: String,
    pub previous_route: Option<Route>,
    pub new_route: Route,
    pub reason: String,
    pub expected_improvement: ExpectedImprovement,
}

/// Active-route table: the committed route for each (source, target) pair
#[derive(Debug, Default)]
pub struct RouteStore {
    active: HashMap<PairKey, Route>,
}

impl RouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: &str, target: &str) -> Option<&Route> {
        self.active.get(&(source.to_string(), target.to_string()))
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &Route)> {
        self.active.iter()
    }

    /// Pairs whose active route traverses `link_id`, sorted
    pub fn pairs_using_link(&self, link_id: &str) -> Vec<PairKey> {
        let mut pairs: Vec<_> = self
            .active
            .iter()
            .filter(|(_, route)| route.uses_link(link_id))
            .map(|(key, _)| key.clone())
            .collect();
        pairs.sort();
        pairs
    }
}

#[derive(Debug, Clone)]
pub struct RerouteAdvisor {
    congestion_margin: f64,
}

impl RerouteAdvisor {
    pub fn new(congestion_margin: f64) -> Self {
        Self { congestion_margin }
    }

    /// Evaluate every bottleneck and return pending suggestions
    ///
    /// Failures are handled before congestion, and each pair is evaluated
    /// at most once per call. Reads only; nothing is committed.
    pub fn suggest(
        &self,
        graph: &TopologyGraph,
        catalog: &mut RouteCatalog,
        bottlenecks: &[Bottleneck],
        store: &RouteStore,
    ) -> Vec<RerouteDecision> {
        let mut ordered: Vec<&Bottleneck> = bottlenecks.iter().collect();
        ordered.sort_by_key(|b| b.kind);

        let mut evaluated: HashSet<PairKey> = HashSet::new();
        let mut suggestions = Vec::new();

        for bottleneck in ordered {
            for (source, target) in Self::affected_pairs(bottleneck, store) {
                if !evaluated.insert((source.clone(), target.clone())) {
                    continue;
                }
                if let Some(decision) =
                    self.evaluate_pair(graph, catalog, bottleneck, &source, &target, store)
                {
                    suggestions.push(decision);
                }
            }
        }

        suggestions
    }

    /// Active flows through the flagged link, or the link's own endpoints
    /// when no active route uses it
    fn affected_pairs(bottleneck: &Bottleneck, store: &RouteStore) -> Vec<PairKey> {
        let pairs = store.pairs_using_link(&bottleneck.link_id);
        if pairs.is_empty() {
            vec![(bottleneck.source_id.clone(), bottleneck.target_id.clone())]
        } else {
            pairs
        }
    }

    fn evaluate_pair(
        &self,
        graph: &TopologyGraph,
        catalog: &mut RouteCatalog,
        bottleneck: &Bottleneck,
        source: &str,
        target: &str,
        store: &RouteStore,
    ) -> Option<RerouteDecision> {
        let candidates = catalog.find_routes(graph, source, target);
        let active = store.get(source, target);

        let Some(best) = candidates
            .iter()
            .find(|r| active.map_or(true, |a| !a.same_path(r)))
        else {
            debug!(source, target, link = %bottleneck.link_id, "no alternative route");
            return None;
        };

        // Compare against the active route as it stands in this topology
        let current = active.and_then(|a| catalog.evaluate_path(graph, &a.path));

        let accepted = match (active, &current) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(a), Some(_))
                if bottleneck.kind == IssueKind::Failure && a.uses_link(&bottleneck.link_id) =>
            {
                true
            }
            (Some(_), Some(cur)) => best.score > cur.score * self.congestion_margin,
        };

        if !accepted {
            debug!(
                source,
                target,
                best = best.score,
                current = current.as_ref().map(|c| c.score),
                "alternative below improvement margin"
            );
            return None;
        }

        let expected_improvement = match current.as_ref().or(active) {
            Some(baseline) => ExpectedImprovement::between(baseline, best),
            None => ExpectedImprovement::first_connection(),
        };

        info!(
            source,
            target,
            route = %best.describe(),
            score = best.score,
            reason = %bottleneck.reason(),
            "reroute suggested"
        );

        Some(RerouteDecision {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            generation: graph.generation(),
            source_id: source.to_string(),
            target_id: target.to_string(),
            previous_route: active.cloned(),
            new_route: best.clone(),
            reason: bottleneck.reason(),
            expected_improvement,
        })
    }

    /// Apply a decision: overwrite the pair's active route and append to the
    /// ledger. On error neither is touched.
    pub fn commit(
        &self,
        graph: &TopologyGraph,
        store: &mut RouteStore,
        ledger: &mut RerouteLedger,
        decision: &RerouteDecision,
    ) -> Result<()> {
        Self::validate(graph, decision)?;

        store.active.insert(
            (decision.source_id.clone(), decision.target_id.clone()),
            decision.new_route.clone(),
        );
        ledger.append(decision.clone());

        info!(
            source = %decision.source_id,
            target = %decision.target_id,
            route = %decision.new_route.describe(),
            "reroute committed"
        );
        Ok(())
    }

    fn validate(graph: &TopologyGraph, decision: &RerouteDecision) -> Result<()> {
        if decision.generation != graph.generation() {
            warn!(decision = %decision.id, "rejecting stale decision");
            return Err(RerouteError::StaleDecision {
                produced: decision.generation,
                current: graph.generation(),
            });
        }

        let route = &decision.new_route;
        let endpoints_match = route.path.first() == Some(&decision.source_id)
            && route.path.last() == Some(&decision.target_id);
        if route.path.len() < 2 || route.links.len() + 1 != route.path.len() || !endpoints_match {
            return Err(RerouteError::MalformedRoute(route.describe()));
        }

        if let Some(missing) = route.path.iter().find(|n| !graph.contains_node(n)) {
            warn!(decision = %decision.id, node = %missing, "rejecting decision with unknown node");
            return Err(RerouteError::NodeNotFound(missing.clone()));
        }

        let mut seen = HashSet::new();
        if let Some(repeated) = route.path.iter().find(|n| !seen.insert(n.as_str())) {
            warn!(decision = %decision.id, node = %repeated, "rejecting looping route");
            return Err(RerouteError::MalformedRoute(route.describe()));
        }

        if let Some(down) = route.links.iter().find(|l| !graph.is_traversable(l)) {
            warn!(decision = %decision.id, link = %down, "rejecting decision over dead link");
            return Err(RerouteError::LinkNotTraversable(down.clone()));
        }

        // Each recorded link must connect the hop it is listed for
        for (hop, link_id) in route.path.windows(2).zip(&route.links) {
            let joined = graph
                .link(link_id)
                .is_some_and(|link| link.joins(&hop[0], &hop[1]));
            if !joined {
                warn!(
                    decision = %decision.id,
                    link = %link_id,
                    from = %hop[0],
                    to = %hop[1],
                    "rejecting route with mismatched hop"
                );
                return Err(RerouteError::MalformedRoute(route.describe()));
            }
        }

        Ok(())
    }
}

impl Default for RerouteAdvisor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CONGESTION_MARGIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BottleneckThresholds, ScoreWeights};
    use crate::scanner::BottleneckScanner;
    use crate::scorer::RouteScorer;
    use crate::telemetry::{FabricLink, FabricNode, HealthStatus, NodeKind};

    fn triangle() -> (Vec<FabricNode>, Vec<FabricLink>) {
        let nodes = ["x", "y", "z"]
            .iter()
            .map(|id| FabricNode::new(*id, NodeKind::Gpu))
            .collect();
        let links = vec![
            FabricLink::new("x-y", "x", "y", 1.0, 100.0).with_utilization(10.0),
            FabricLink::new("y-z", "y", "z", 1.0, 100.0).with_utilization(10.0),
            FabricLink::new("x-z", "x", "z", 1.0, 100.0).with_utilization(10.0),
        ];
        (nodes, links)
    }

    fn catalog() -> RouteCatalog {
        RouteCatalog::new(RouteScorer::new(ScoreWeights::default(), 4))
    }

    #[test]
    fn test_first_connection_is_suggested() {
        let (nodes, mut links) = triangle();
        links[0] = links[0].clone().with_utilization(90.0);
        let mut graph = TopologyGraph::new();
        graph.update(&nodes, &links);

        let bottlenecks = BottleneckScanner::scan(&graph, &BottleneckThresholds::default());
        let store = RouteStore::new();
        let suggestions =
            RerouteAdvisor::default().suggest(&graph, &mut catalog(), &bottlenecks, &store);

        assert_eq!(suggestions.len(), 1);
        let decision = &suggestions[0];
        assert_eq!((decision.source_id.as_str(), decision.target_id.as_str()), ("x", "y"));
        assert!(decision.previous_route.is_none());
        assert_eq!(decision.expected_improvement, ExpectedImprovement::first_connection());
        assert_eq!(decision.reason, "Avoid congestion on x-y");
    }

    #[test]
    fn test_never_suggests_the_active_route() {
        let (nodes, links) = triangle();
        let mut graph = TopologyGraph::new();
        graph.update(&nodes, &links);

        let mut catalog = catalog();
        let mut store = RouteStore::new();
        let mut ledger = RerouteLedger::new();
        let advisor = RerouteAdvisor::new(1.0);

        // Commit the direct hop, then make it the only candidate
        let direct = catalog.find_routes(&graph, "x", "z")[0].clone();
        assert_eq!(direct.describe(), "x -> z");
        let decision = RerouteDecision {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            generation: graph.generation(),
            source_id: "x".to_string(),
            target_id: "z".to_string(),
            previous_route: None,
            new_route: direct,
            reason: "seed".to_string(),
            expected_improvement: ExpectedImprovement::first_connection(),
        };
        advisor.commit(&graph, &mut store, &mut ledger, &decision).unwrap();

        let mut congested = links.clone();
        congested[2] = congested[2].clone().with_utilization(99.0);
        congested[0] = congested[0].clone().with_status(HealthStatus::Failed);
        graph.update(&nodes, &congested);

        let bottlenecks = BottleneckScanner::scan(&graph, &BottleneckThresholds::default());
        let suggestions = advisor.suggest(&graph, &mut catalog, &bottlenecks, &store);

        for s in &suggestions {
            if let Some(active) = store.get(&s.source_id, &s.target_id) {
                assert!(!active.same_path(&s.new_route));
            }
        }
        assert!(suggestions.iter().all(|s| s.source_id != "x" || s.target_id != "z"));
    }

    #[test]
    fn test_commit_rejects_stale_and_unknown() {
        let (nodes, links) = triangle();
        let mut graph = TopologyGraph::new();
        graph.update(&nodes, &links);

        let mut catalog = catalog();
        let route = catalog.find_routes(&graph, "x", "y")[0].clone();
        let decision = RerouteDecision {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            generation: graph.generation(),
            source_id: "x".to_string(),
            target_id: "y".to_string(),
            previous_route: None,
            new_route: route,
            reason: "test".to_string(),
            expected_improvement: ExpectedImprovement::default(),
        };

        let advisor = RerouteAdvisor::default();
        let mut store = RouteStore::new();
        let mut ledger = RerouteLedger::new();

        // Unknown node after the topology moved on
        graph.update(&nodes[1..], &links);
        let mut stale = decision.clone();
        let err = advisor.commit(&graph, &mut store, &mut ledger, &stale).unwrap_err();
        assert!(matches!(err, RerouteError::StaleDecision { .. }));

        stale.generation = graph.generation();
        let err = advisor.commit(&graph, &mut store, &mut ledger, &stale).unwrap_err();
        assert!(matches!(err, RerouteError::NodeNotFound(ref n) if n == "x"));

        assert!(store.is_empty());
        assert!(ledger.is_empty());
    }

    fn decision_for(
        graph: &TopologyGraph,
        source: &str,
        target: &str,
        route: Route,
    ) -> RerouteDecision {
        RerouteDecision {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            generation: graph.generation(),
            source_id: source.to_string(),
            target_id: target.to_string(),
            previous_route: None,
            new_route: route,
            reason: "test".to_string(),
            expected_improvement: ExpectedImprovement::default(),
        }
    }

    #[test]
    fn test_commit_rejects_dead_link() {
        let (nodes, mut links) = triangle();
        let mut graph = TopologyGraph::new();
        graph.update(&nodes, &links);
        let route = catalog().find_routes(&graph, "x", "y")[0].clone();
        assert_eq!(route.links, vec!["x-y".to_string()]);

        links[0] = links[0].clone().with_status(HealthStatus::Failed);
        graph.update(&nodes, &links);
        let decision = decision_for(&graph, "x", "y", route);

        let advisor = RerouteAdvisor::default();
        let mut store = RouteStore::new();
        let mut ledger = RerouteLedger::new();
        let err = advisor.commit(&graph, &mut store, &mut ledger, &decision).unwrap_err();

        assert!(matches!(err, RerouteError::LinkNotTraversable(ref l) if l == "x-y"));
        assert!(store.is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_commit_rejects_routes_search_cannot_produce() {
        let (nodes, links) = triangle();
        let mut graph = TopologyGraph::new();
        graph.update(&nodes, &links);

        let template = catalog().find_routes(&graph, "x", "z")[0].clone();
        let advisor = RerouteAdvisor::default();
        let mut store = RouteStore::new();
        let mut ledger = RerouteLedger::new();

        // Direct hop recorded over a link that does not join x and z
        let mut mismatched = template.clone();
        mismatched.links = vec!["y-z".to_string()];
        let decision = decision_for(&graph, "x", "z", mismatched);
        let err = advisor.commit(&graph, &mut store, &mut ledger, &decision).unwrap_err();
        assert!(matches!(err, RerouteError::MalformedRoute(_)));

        // Revisits x before reaching z
        let mut looping = template;
        looping.path = ["x", "y", "x", "z"].iter().map(|n| n.to_string()).collect();
        looping.links = ["x-y", "x-y", "x-z"].iter().map(|l| l.to_string()).collect();
        looping.hop_count = 3;
        let decision = decision_for(&graph, "x", "z", looping);
        let err = advisor.commit(&graph, &mut store, &mut ledger, &decision).unwrap_err();
        assert!(matches!(err, RerouteError::MalformedRoute(_)));

        assert!(store.is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_improvement_between_routes() {
        let mut catalog = catalog();
        let (nodes, links) = triangle();
        let graph = TopologyGraph::from_snapshot(&crate::TopologySnapshot::new(nodes, links));
        let routes = catalog.find_routes(&graph, "x", "z");

        let direct = &routes[0];
        let detour = &routes[1];
        let improvement = ExpectedImprovement::between(direct, detour);

        assert_eq!(improvement.latency_pct, Some(-100.0));
        assert_eq!(improvement.bandwidth_pct, Some(0.0));
        assert_eq!(improvement.utilization_pct, Some(0.0));
    }
}
