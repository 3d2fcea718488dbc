//! Bottleneck detection and fabric health analysis

use crate::config::BottleneckThresholds;
use crate::telemetry::{FabricLink, HealthStatus};
use crate::topology::TopologyGraph;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a link was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    /// Link is not healthy
    Failure,
    /// Healthy link above a metric threshold
    Congestion,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Failure => write!(f, "failure"),
            IssueKind::Congestion => write!(f, "congestion"),
        }
    }
}

/// The condition that triggered a flag
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum Trigger {
    Utilization { value_pct: f64, threshold_pct: f64 },
    Latency { value_ms: f64, threshold_ms: f64 },
    ErrorRate { value_pct: f64, threshold_pct: f64 },
    LinkDown { status: HealthStatus },
}

/// A flagged link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bottleneck {
    pub link_id: String,
    pub source_id: String,
    pub target_id: String,
    pub kind: IssueKind,
    pub latency_ms: f64,
    pub utilization_pct: f64,
    pub error_rate_pct: f64,
    pub triggers: Vec<Trigger>,
}

impl Bottleneck {
    fn from_link(link: &FabricLink, kind: IssueKind, triggers: Vec<Trigger>) -> Self {
        Self {
            link_id: link.id.clone(),
            source_id: link.source_id.clone(),
            target_id: link.target_id.clone(),
            kind,
            latency_ms: link.latency_ms,
            utilization_pct: link.utilization_pct,
            error_rate_pct: link.error_rate_pct,
            triggers,
        }
    }

    /// Reason string recorded on decisions
    pub fn reason(&self) -> String {
        format!("Avoid {} on {}", self.kind, self.link_id)
    }
}

pub struct BottleneckScanner;

impl BottleneckScanner {
    /// Flag every unhealthy link, and every healthy link with a metric
    /// strictly above its threshold. Results follow snapshot link order.
    pub fn scan(graph: &TopologyGraph, thresholds: &BottleneckThresholds) -> Vec<Bottleneck> {
        graph
            .links()
            .filter_map(|link| Self::inspect(link, thresholds))
            .collect()
    }

    /// Flag a single link, if it needs it
    pub fn inspect(link: &FabricLink, thresholds: &BottleneckThresholds) -> Option<Bottleneck> {
        if !link.status.is_healthy() {
            let triggers = vec![Trigger::LinkDown { status: link.status }];
            return Some(Bottleneck::from_link(link, IssueKind::Failure, triggers));
        }

        let mut triggers = Vec::new();
        if link.utilization_pct > thresholds.utilization_pct {
            triggers.push(Trigger::Utilization {
                value_pct: link.utilization_pct,
                threshold_pct: thresholds.utilization_pct,
            });
        }
        if link.latency_ms > thresholds.latency_ms {
            triggers.push(Trigger::Latency {
                value_ms: link.latency_ms,
                threshold_ms: thresholds.latency_ms,
            });
        }
        if link.error_rate_pct > thresholds.error_rate_pct {
            triggers.push(Trigger::ErrorRate {
                value_pct: link.error_rate_pct,
                threshold_pct: thresholds.error_rate_pct,
            });
        }

        if triggers.is_empty() {
            None
        } else {
            Some(Bottleneck::from_link(link, IssueKind::Congestion, triggers))
        }
    }
}

/// Point-in-time health summary of the fabric
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkHealthReport {
    pub total_nodes: usize,
    pub healthy_nodes: usize,
    pub degraded_nodes: usize,
    /// Failed or offline
    pub failed_nodes: usize,
    pub total_links: usize,
    pub healthy_links: usize,
    pub congested_links: usize,
    pub failed_links: usize,
    /// Mean over healthy links
    pub avg_latency_ms: f64,
    /// Mean over healthy links
    pub avg_utilization_pct: f64,
    pub bottlenecks: Vec<Bottleneck>,
}

pub fn analyze_health(graph: &TopologyGraph, thresholds: &BottleneckThresholds) -> NetworkHealthReport {
    let mut report = NetworkHealthReport::default();

    for node in graph.nodes() {
        report.total_nodes += 1;
        match node.status {
            HealthStatus::Healthy => report.healthy_nodes += 1,
            HealthStatus::Degraded => report.degraded_nodes += 1,
            HealthStatus::Failed | HealthStatus::Offline => report.failed_nodes += 1,
        }
    }

    let mut total_latency = 0.0;
    let mut total_utilization = 0.0;

    for link in graph.links() {
        report.total_links += 1;
        if link.status.is_healthy() {
            report.healthy_links += 1;
            total_latency += link.latency_ms;
            total_utilization += link.utilization_pct;
        } else {
            report.failed_links += 1;
        }

        if let Some(bottleneck) = BottleneckScanner::inspect(link, thresholds) {
            if bottleneck.kind == IssueKind::Congestion {
                report.congested_links += 1;
            }
            report.bottlenecks.push(bottleneck);
        }
    }

    if report.healthy_links > 0 {
        report.avg_latency_ms = total_latency / report.healthy_links as f64;
        report.avg_utilization_pct = total_utilization / report.healthy_links as f64;
    }

    report
}
