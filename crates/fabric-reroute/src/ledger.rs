//! Append-only record of committed reroute decisions

use crate::advisor::RerouteDecision;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rolling statistics over every committed decision
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RerouteStatistics {
    pub total_count: usize,
    /// Mean over decisions that carry a latency estimate
    pub avg_latency_improvement_pct: f64,
    /// Mean over decisions that carry a bandwidth estimate
    pub avg_bandwidth_improvement_pct: f64,
    pub avg_utilization_improvement_pct: f64,
    pub reason_histogram: BTreeMap<String, usize>,
    /// Most recent last
    pub recent_decisions: Vec<RerouteDecision>,
}

#[derive(Debug, Default)]
pub struct RerouteLedger {
    entries: Vec<RerouteDecision>,
}

impl RerouteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, decision: RerouteDecision) {
        self.entries.push(decision);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `n` most recent decisions, oldest first
    pub fn recent(&self, n: usize) -> &[RerouteDecision] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn reason_histogram(&self) -> BTreeMap<String, usize> {
        let mut histogram = BTreeMap::new();
        for decision in &self.entries {
            *histogram.entry(decision.reason.clone()).or_insert(0) += 1;
        }
        histogram
    }

    pub fn statistics(&self, recent: usize) -> RerouteStatistics {
        let improvements = self.entries.iter().map(|d| &d.expected_improvement);

        RerouteStatistics {
            total_count: self.entries.len(),
            avg_latency_improvement_pct: mean(improvements.clone().filter_map(|i| i.latency_pct)),
            avg_bandwidth_improvement_pct: mean(
                improvements.clone().filter_map(|i| i.bandwidth_pct),
            ),
            avg_utilization_improvement_pct: mean(improvements.filter_map(|i| i.utilization_pct)),
            reason_histogram: self.reason_histogram(),
            recent_decisions: self.recent(recent).to_vec(),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::ExpectedImprovement;
    use crate::catalog::Route;
    use crate::scorer::RouteQuality;
    use chrono::Utc;
    use uuid::Uuid;

    fn decision(reason: &str, latency: Option<f64>, bandwidth: Option<f64>) -> RerouteDecision {
        RerouteDecision {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            generation: 1,
            source_id: "a".to_string(),
            target_id: "b".to_string(),
            previous_route: None,
            new_route: Route {
                source_id: "a".to_string(),
                target_id: "b".to_string(),
                path: vec!["a".to_string(), "b".to_string()],
                links: vec!["a-b".to_string()],
                hop_count: 1,
                total_latency_ms: 1.0,
                bottleneck_bandwidth_gbps: 10.0,
                peak_utilization_pct: 5.0,
                quality: RouteQuality::Excellent,
                score: 0.9,
            },
            reason: reason.to_string(),
            expected_improvement: ExpectedImprovement {
                latency_pct: latency,
                bandwidth_pct: bandwidth,
                utilization_pct: None,
            },
        }
    }

    #[test]
    fn test_empty_ledger_statistics() {
        let stats = RerouteLedger::new().statistics(5);
        assert_eq!(stats.total_count, 0);
        assert_eq!(stats.avg_latency_improvement_pct, 0.0);
        assert!(stats.reason_histogram.is_empty());
        assert!(stats.recent_decisions.is_empty());
    }

    #[test]
    fn test_statistics() {
        let mut ledger = RerouteLedger::new();
        ledger.append(decision("Avoid failure on x", Some(10.0), Some(50.0)));
        ledger.append(decision("Avoid failure on x", Some(30.0), None));
        ledger.append(decision("Avoid congestion on y", None, Some(-10.0)));

        let stats = ledger.statistics(2);
        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.avg_latency_improvement_pct, 20.0);
        assert_eq!(stats.avg_bandwidth_improvement_pct, 20.0);
        assert_eq!(stats.reason_histogram["Avoid failure on x"], 2);
        assert_eq!(stats.reason_histogram["Avoid congestion on y"], 1);
        assert_eq!(stats.recent_decisions.len(), 2);
        assert_eq!(stats.recent_decisions[1].reason, "Avoid congestion on y");
    }
}
