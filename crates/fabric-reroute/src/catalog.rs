//! Candidate route enumeration and per-tick caching
//!
//! Routes are found by a bounded depth-first search over an explicit stack
//! of immutable path prefixes. Each extension pushes a copy of its parent,
//! so no traversal state is shared between branches or between calls.
//!
//! Aggregates accumulate as links are added:
//! - latency: sum
//! - bandwidth: minimum (bottleneck)
//! - utilization: maximum (peak)

use crate::scorer::{RouteQuality, RouteScorer};
use crate::telemetry::FabricLink;
use crate::topology::TopologyGraph;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A simple path through the fabric with aggregate metrics
///
/// Immutable once built. Routes are recomputed whenever the topology
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub source_id: String,
    pub target_id: String,
    /// Node IDs in traversal order, no repeats
    pub path: Vec<String>,
    /// Link traversed for each hop (`path.len() - 1` entries)
    pub links: Vec<String>,
    pub hop_count: usize,
    pub total_latency_ms: f64,
    pub bottleneck_bandwidth_gbps: f64,
    pub peak_utilization_pct: f64,
    pub quality: RouteQuality,
    /// Score assigned by the catalog's scorer
    pub score: f64,
}

impl Route {
    pub fn same_path(&self, other: &Route) -> bool {
        self.path == other.path
    }

    pub fn uses_link(&self, link_id: &str) -> bool {
        self.links.iter().any(|l| l == link_id)
    }

    /// Human-readable path, e.g. `A -> C -> D`
    pub fn describe(&self) -> String {
        self.path.join(" -> ")
    }
}

/// Best-first ordering: score descending, then fewer hops, then the
/// lexicographically smallest node sequence.
pub fn rank(a: &Route, b: &Route) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.hop_count.cmp(&b.hop_count))
        .then_with(|| a.path.cmp(&b.path))
}

/// Partial path on the search stack
#[derive(Clone)]
struct Prefix<'a> {
    nodes: Vec<&'a str>,
    links: Vec<&'a str>,
    latency_ms: f64,
    min_bandwidth_gbps: f64,
    max_utilization_pct: f64,
}

impl<'a> Prefix<'a> {
    fn start(source: &'a str) -> Self {
        Self {
            nodes: vec![source],
            links: Vec::new(),
            latency_ms: 0.0,
            min_bandwidth_gbps: f64::INFINITY,
            max_utilization_pct: 0.0,
        }
    }

    fn head(&self) -> &'a str {
        self.nodes[self.nodes.len() - 1]
    }

    fn visits(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|n| *n == node_id)
    }

    fn extend(&self, node_id: &'a str, link: &'a FabricLink) -> Self {
        let mut next = self.clone();
        next.nodes.push(node_id);
        next.links.push(&link.id);
        next.latency_ms += link.latency_ms;
        next.min_bandwidth_gbps = next.min_bandwidth_gbps.min(link.bandwidth_gbps);
        next.max_utilization_pct = next.max_utilization_pct.max(link.utilization_pct);
        next
    }

    fn into_route(self, scorer: &RouteScorer) -> Route {
        let hop_count = self.links.len();
        let quality = RouteQuality::classify(self.latency_ms, self.max_utilization_pct);
        let score = scorer.score_metrics(
            self.latency_ms,
            self.min_bandwidth_gbps,
            self.max_utilization_pct,
            hop_count,
        );

        Route {
            source_id: self.nodes[0].to_string(),
            target_id: self.head().to_string(),
            path: self.nodes.iter().map(|n| n.to_string()).collect(),
            links: self.links.iter().map(|l| l.to_string()).collect(),
            hop_count,
            total_latency_ms: self.latency_ms,
            bottleneck_bandwidth_gbps: self.min_bandwidth_gbps,
            peak_utilization_pct: self.max_utilization_pct,
            quality,
            score,
        }
    }
}

/// Route cache stamped with the topology generation it was filled under
///
/// A lookup under any other generation is a miss, and the first insert
/// under a new generation drops every older entry.
#[derive(Debug, Default)]
pub struct RouteCache {
    generation: u64,
    entries: HashMap<(String, String), Vec<Route>>,
}

impl RouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, generation: u64, source: &str, target: &str) -> Option<&Vec<Route>> {
        if generation != self.generation {
            return None;
        }
        self.entries.get(&(source.to_string(), target.to_string()))
    }

    pub fn insert(&mut self, generation: u64, source: &str, target: &str, routes: Vec<Route>) {
        if generation != self.generation {
            self.entries.clear();
            self.generation = generation;
        }
        self.entries
            .insert((source.to_string(), target.to_string()), routes);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Enumerates and caches candidate routes between node pairs
pub struct RouteCatalog {
    max_hops: usize,
    scorer: RouteScorer,
    cache: RouteCache,
}

impl RouteCatalog {
    pub fn new(scorer: RouteScorer) -> Self {
        Self {
            max_hops: scorer.max_hops(),
            scorer,
            cache: RouteCache::new(),
        }
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    /// Drop cached routes; called by the engine on every topology update
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// All simple paths from `source` to `target` with at most `max_hops`
    /// hops, best first. Empty when the pair is unknown or unreachable.
    pub fn find_routes(&mut self, graph: &TopologyGraph, source: &str, target: &str) -> Vec<Route> {
        let generation = graph.generation();
        if let Some(routes) = self.cache.get(generation, source, target) {
            return routes.clone();
        }

        let routes = self.enumerate(graph, source, target);
        debug!(
            source,
            target,
            found = routes.len(),
            generation,
            "route enumeration complete"
        );
        self.cache.insert(generation, source, target, routes.clone());
        routes
    }

    fn enumerate(&self, graph: &TopologyGraph, source: &str, target: &str) -> Vec<Route> {
        let mut routes = Vec::new();
        if !graph.contains_node(source) || !graph.contains_node(target) {
            return routes;
        }

        let max_len = self.max_hops + 1;
        let mut stack = vec![Prefix::start(source)];

        while let Some(prefix) = stack.pop() {
            let head = prefix.head();

            if head == target && prefix.nodes.len() > 1 {
                routes.push(prefix.into_route(&self.scorer));
                continue;
            }

            if prefix.nodes.len() >= max_len {
                continue;
            }

            // Reverse so the stack pops neighbors in id order
            for neighbor in graph.neighbors(head).into_iter().rev() {
                if prefix.visits(neighbor.node_id) {
                    continue;
                }
                if let Some(link) = neighbor.preferred_link() {
                    stack.push(prefix.extend(neighbor.node_id, link));
                }
            }
        }

        routes.sort_by(rank);
        routes
    }

    /// Re-derive a route for a known node sequence against the current
    /// topology. `None` if the path repeats a node or any hop is no longer
    /// traversable.
    pub fn evaluate_path(&self, graph: &TopologyGraph, path: &[String]) -> Option<Route> {
        if path.len() < 2 {
            return None;
        }

        let mut seen = HashSet::with_capacity(path.len());
        if !path.iter().all(|n| seen.insert(n.as_str())) {
            return None;
        }

        let mut prefix = Prefix::start(path[0].as_str());
        for pair in path.windows(2) {
            let link = graph.preferred_link(&pair[0], &pair[1])?;
            prefix = prefix.extend(pair[1].as_str(), link);
        }

        Some(prefix.into_route(&self.scorer))
    }
}
