//! Telemetry snapshot records consumed once per tick.
//!
//! Snapshots are a full replacement of the fabric state, never a delta.
//! The engine only reads them; the producer owns their lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status shared by nodes and links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Degraded,
    Failed,
    Offline,
}

impl HealthStatus {
    #[inline]
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Hardware element category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Cpu,
    Gpu,
    Memory,
    Switch,
    Storage,
}

/// Interconnect medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkCategory {
    Pcie,
    Nvlink,
    Cxl,
    #[default]
    Fabric,
    Ddr,
}

/// A node in the compute fabric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricNode {
    pub id: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub status: HealthStatus,
}

impl FabricNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            status: HealthStatus::Healthy,
        }
    }

    pub fn with_status(mut self, status: HealthStatus) -> Self {
        self.status = status;
        self
    }
}

/// An undirected interconnect between two fabric nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricLink {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub category: LinkCategory,
    #[serde(default)]
    pub status: HealthStatus,
    /// Latency in milliseconds
    pub latency_ms: f64,
    /// Capacity in Gbps
    pub bandwidth_gbps: f64,
    /// Utilization (0-100%)
    #[serde(default)]
    pub utilization_pct: f64,
    /// Error rate (0-100%)
    #[serde(default)]
    pub error_rate_pct: f64,
}

impl FabricLink {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        latency_ms: f64,
        bandwidth_gbps: f64,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            category: LinkCategory::Fabric,
            status: HealthStatus::Healthy,
            latency_ms,
            bandwidth_gbps,
            utilization_pct: 0.0,
            error_rate_pct: 0.0,
        }
    }

    pub fn with_category(mut self, category: LinkCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_status(mut self, status: HealthStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_utilization(mut self, utilization_pct: f64) -> Self {
        self.utilization_pct = utilization_pct;
        self
    }

    pub fn with_error_rate(mut self, error_rate_pct: f64) -> Self {
        self.error_rate_pct = error_rate_pct;
        self
    }

    /// Returns the opposite endpoint, if `node_id` is one of ours
    pub fn other_end(&self, node_id: &str) -> Option<&str> {
        if self.source_id == node_id {
            Some(&self.target_id)
        } else if self.target_id == node_id {
            Some(&self.source_id)
        } else {
            None
        }
    }

    /// True when this link joins `a` and `b` in either orientation
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.source_id == a && self.target_id == b) || (self.source_id == b && self.target_id == a)
    }
}

/// One telemetry frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
    pub nodes: Vec<FabricNode>,
    pub links: Vec<FabricLink>,
}

impl TopologySnapshot {
    pub fn new(nodes: Vec<FabricNode>, links: Vec<FabricLink>) -> Self {
        Self {
            captured_at: Utc::now(),
            nodes,
            links,
        }
    }

    pub fn link(&self, id: &str) -> Option<&FabricLink> {
        self.links.iter().find(|l| l.id == id)
    }

    pub fn link_mut(&mut self, id: &str) -> Option<&mut FabricLink> {
        self.links.iter_mut().find(|l| l.id == id)
    }
}
