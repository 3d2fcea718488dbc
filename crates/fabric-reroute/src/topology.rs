//! Traversable fabric topology
//!
//! Rebuilt wholesale on every update. Only healthy links become edges; a
//! failed link is structurally absent rather than penalized. Parallel links
//! between the same node pair are kept as independent edges.

use crate::telemetry::{FabricLink, FabricNode, TopologySnapshot};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Outcome of a topology rebuild
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReport {
    /// Generation after this update
    pub generation: u64,
    pub nodes: usize,
    /// Links with known endpoints (any status)
    pub links: usize,
    /// Healthy links that became edges
    pub traversable_links: usize,
    /// Links dropped as malformed
    pub skipped_links: usize,
    pub skipped_link_ids: Vec<String>,
}

/// A neighbor reachable over one or more healthy parallel links
#[derive(Debug, Clone)]
pub struct Neighbor<'a> {
    pub node_id: &'a str,
    pub links: Vec<&'a FabricLink>,
}

impl<'a> Neighbor<'a> {
    pub fn link_ids(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.links.iter().map(|l| l.id.as_str())
    }

    /// The parallel link a route should traverse: lowest latency, then
    /// highest bandwidth, then lowest utilization, then smallest id.
    pub fn preferred_link(&self) -> Option<&'a FabricLink> {
        self.links.iter().copied().min_by(|a, b| compare_links(a, b))
    }
}

pub(crate) fn compare_links(a: &FabricLink, b: &FabricLink) -> Ordering {
    a.latency_ms
        .total_cmp(&b.latency_ms)
        .then_with(|| b.bandwidth_gbps.total_cmp(&a.bandwidth_gbps))
        .then_with(|| a.utilization_pct.total_cmp(&b.utilization_pct))
        .then_with(|| a.id.cmp(&b.id))
}

/// In-memory adjacency view of the latest snapshot
pub struct TopologyGraph {
    /// Edge weight is an index into `links`
    graph: UnGraph<String, usize>,
    node_index: HashMap<String, NodeIndex>,
    nodes: Vec<FabricNode>,
    /// Every link with known endpoints, healthy or not
    links: Vec<FabricLink>,
    link_index: HashMap<String, usize>,
    traversable: HashSet<String>,
    generation: u64,
    skipped_links: usize,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self {
            graph: UnGraph::default(),
            node_index: HashMap::new(),
            nodes: Vec::new(),
            links: Vec::new(),
            link_index: HashMap::new(),
            traversable: HashSet::new(),
            generation: 0,
            skipped_links: 0,
        }
    }

    /// Build a graph from a single snapshot
    pub fn from_snapshot(snapshot: &TopologySnapshot) -> Self {
        let mut graph = Self::new();
        graph.update(&snapshot.nodes, &snapshot.links);
        graph
    }

    /// Replace the adjacency view entirely
    ///
    /// Links referencing unknown nodes, or repeating an id already seen in
    /// this snapshot, are skipped and counted.
    pub fn update(&mut self, nodes: &[FabricNode], links: &[FabricLink]) -> UpdateReport {
        let mut graph = UnGraph::with_capacity(nodes.len(), links.len());
        let mut node_index = HashMap::with_capacity(nodes.len());
        let mut kept_nodes = Vec::with_capacity(nodes.len());

        for node in nodes {
            if node_index.contains_key(&node.id) {
                warn!(node_id = %node.id, "duplicate node id in snapshot, keeping first");
                continue;
            }
            let idx = graph.add_node(node.id.clone());
            node_index.insert(node.id.clone(), idx);
            kept_nodes.push(node.clone());
        }

        let mut kept_links = Vec::with_capacity(links.len());
        let mut link_index = HashMap::with_capacity(links.len());
        let mut traversable = HashSet::new();
        let mut skipped_link_ids = Vec::new();

        for link in links {
            let endpoints = (node_index.get(&link.source_id), node_index.get(&link.target_id));
            let (from, to) = match endpoints {
                (Some(from), Some(to)) if !link_index.contains_key(&link.id) => (*from, *to),
                _ => {
                    skipped_link_ids.push(link.id.clone());
                    continue;
                }
            };

            let slot = kept_links.len();
            link_index.insert(link.id.clone(), slot);
            kept_links.push(link.clone());

            // Self-loops can never be part of a simple path
            if link.status.is_healthy() && from != to {
                graph.add_edge(from, to, slot);
                traversable.insert(link.id.clone());
            }
        }

        if !skipped_link_ids.is_empty() {
            warn!(
                skipped = skipped_link_ids.len(),
                "skipped malformed links (unknown endpoint or duplicate id)"
            );
        }

        self.graph = graph;
        self.node_index = node_index;
        self.nodes = kept_nodes;
        self.links = kept_links;
        self.link_index = link_index;
        self.traversable = traversable;
        self.skipped_links = skipped_link_ids.len();
        self.generation += 1;

        debug!(
            generation = self.generation,
            nodes = self.nodes.len(),
            links = self.links.len(),
            traversable = self.traversable.len(),
            "topology rebuilt"
        );

        UpdateReport {
            generation: self.generation,
            nodes: self.nodes.len(),
            links: self.links.len(),
            traversable_links: self.traversable.len(),
            skipped_links: skipped_link_ids.len(),
            skipped_link_ids,
        }
    }

    /// Monotonic counter bumped on every update
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&FabricNode> {
        self.node_index
            .get(id)
            .and_then(|idx| self.nodes.get(idx.index()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FabricNode> {
        self.nodes.iter()
    }

    /// All links with known endpoints, including unhealthy ones
    pub fn links(&self) -> impl Iterator<Item = &FabricLink> {
        self.links.iter()
    }

    pub fn link(&self, id: &str) -> Option<&FabricLink> {
        self.link_index.get(id).map(|slot| &self.links[*slot])
    }

    pub fn is_traversable(&self, link_id: &str) -> bool {
        self.traversable.contains(link_id)
    }

    /// Neighbors reachable over healthy links, sorted by node id
    pub fn neighbors(&self, node_id: &str) -> Vec<Neighbor<'_>> {
        let Some(idx) = self.node_index.get(node_id) else {
            return Vec::new();
        };

        let mut grouped: BTreeMap<&str, Vec<&FabricLink>> = BTreeMap::new();
        for edge in self.graph.edges(*idx) {
            let other = if edge.source() == *idx {
                edge.target()
            } else {
                edge.source()
            };
            let link = &self.links[*edge.weight()];
            grouped
                .entry(self.graph[other].as_str())
                .or_default()
                .push(link);
        }

        grouped
            .into_iter()
            .map(|(node_id, mut links)| {
                links.sort_by(|a, b| a.id.cmp(&b.id));
                Neighbor { node_id, links }
            })
            .collect()
    }

    /// Preferred healthy link between two nodes
    pub fn preferred_link(&self, a: &str, b: &str) -> Option<&FabricLink> {
        let from = self.node_index.get(a)?;
        let to = self.node_index.get(b)?;
        self.graph
            .edges(*from)
            .filter(|e| {
                let other = if e.source() == *from { e.target() } else { e.source() };
                other == *to
            })
            .map(|e| &self.links[*e.weight()])
            .min_by(|x, y| compare_links(x, y))
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            generation: self.generation,
            total_nodes: self.nodes.len(),
            healthy_nodes: self.nodes.iter().filter(|n| n.status.is_healthy()).count(),
            total_links: self.links.len(),
            traversable_links: self.traversable.len(),
            skipped_links: self.skipped_links,
        }
    }
}

impl Default for TopologyGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Graph statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub generation: u64,
    pub total_nodes: usize,
    pub healthy_nodes: usize,
    pub total_links: usize,
    pub traversable_links: usize,
    pub skipped_links: usize,
}
