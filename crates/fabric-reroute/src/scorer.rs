//! Route scoring and quality tiers
//!
//! Score is a weighted sum of normalized sub-scores (higher = better):
//!
//! ```text
//! S(r) = w_lat·L + w_bw·B + w_util·U + w_hop·H
//!
//! L = max(0, ceiling − latency) / ceiling
//! B = min(1, bandwidth / reference)
//! U = max(0, 100 − peak_utilization) / 100
//! H = max(0, max_hops − hops) / max_hops
//! ```
//!
//! The hop term is a bonus on top of the normalized budget, so a perfect
//! route scores slightly above `w_lat + w_bw + w_util`.

use crate::catalog::Route;
use crate::config::ScoreWeights;
use serde::{Deserialize, Serialize};

/// Discrete route desirability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteQuality {
    /// < 2ms latency and < 50% utilization
    Excellent,
    /// < 5ms latency and < 70% utilization
    Good,
    /// < 10ms latency and < 85% utilization
    Fair,
    Poor,
    /// Reserved for routes with no valid edge. The catalog never produces
    /// one because unhealthy links are absent from the graph.
    Failed,
}

impl RouteQuality {
    /// First matching tier wins
    pub fn classify(total_latency_ms: f64, peak_utilization_pct: f64) -> Self {
        if total_latency_ms < 2.0 && peak_utilization_pct < 50.0 {
            RouteQuality::Excellent
        } else if total_latency_ms < 5.0 && peak_utilization_pct < 70.0 {
            RouteQuality::Good
        } else if total_latency_ms < 10.0 && peak_utilization_pct < 85.0 {
            RouteQuality::Fair
        } else {
            RouteQuality::Poor
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteScorer {
    weights: ScoreWeights,
    max_hops: usize,
}

impl RouteScorer {
    pub fn new(weights: ScoreWeights, max_hops: usize) -> Self {
        Self {
            weights,
            max_hops: max_hops.max(1),
        }
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    #[inline]
    pub fn score(&self, route: &Route) -> f64 {
        self.score_metrics(
            route.total_latency_ms,
            route.bottleneck_bandwidth_gbps,
            route.peak_utilization_pct,
            route.hop_count,
        )
    }

    pub fn score_metrics(
        &self,
        total_latency_ms: f64,
        bottleneck_bandwidth_gbps: f64,
        peak_utilization_pct: f64,
        hop_count: usize,
    ) -> f64 {
        let w = &self.weights;

        let latency_score =
            (w.latency_ceiling_ms - total_latency_ms).max(0.0) / w.latency_ceiling_ms;
        let bandwidth_score = (bottleneck_bandwidth_gbps / w.bandwidth_reference_gbps).min(1.0);
        let utilization_score = (100.0 - peak_utilization_pct).max(0.0) / 100.0;
        let hop_score = self.max_hops.saturating_sub(hop_count) as f64 / self.max_hops as f64;

        w.latency * latency_score
            + w.bandwidth * bandwidth_score
            + w.utilization * utilization_score
            + w.hop_bonus * hop_score
    }
}

impl Default for RouteScorer {
    fn default() -> Self {
        Self::new(ScoreWeights::default(), crate::config::DEFAULT_MAX_HOPS)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        #[test]
        fn fuzz_score_monotonic_in_utilization(
            latency in 0.0f64..40.0,
            bandwidth in 0.0f64..200.0,
            util_a in 0.0f64..=100.0,
            util_b in 0.0f64..=100.0,
            hops in 1usize..=6,
        ) {
            let scorer = RouteScorer::default();
            let (low, high) = if util_a <= util_b { (util_a, util_b) } else { (util_b, util_a) };
            prop_assert!(
                scorer.score_metrics(latency, bandwidth, low, hops)
                    >= scorer.score_metrics(latency, bandwidth, high, hops)
            );
        }

        #[test]
        fn fuzz_score_monotonic_in_latency_and_hops(
            lat_a in 0.0f64..40.0,
            lat_b in 0.0f64..40.0,
            hops_a in 1usize..=6,
            hops_b in 1usize..=6,
            bandwidth in 0.0f64..200.0,
            util in 0.0f64..=100.0,
        ) {
            let scorer = RouteScorer::default();
            let (fast, slow) = if lat_a <= lat_b { (lat_a, lat_b) } else { (lat_b, lat_a) };
            prop_assert!(
                scorer.score_metrics(fast, bandwidth, util, 2)
                    >= scorer.score_metrics(slow, bandwidth, util, 2)
            );

            let (short, long) = if hops_a <= hops_b { (hops_a, hops_b) } else { (hops_b, hops_a) };
            prop_assert!(
                scorer.score_metrics(1.0, bandwidth, util, short)
                    >= scorer.score_metrics(1.0, bandwidth, util, long)
            );
        }

        #[test]
        fn fuzz_score_monotonic_in_bandwidth(
            bw_a in 0.0f64..300.0,
            bw_b in 0.0f64..300.0,
        ) {
            let scorer = RouteScorer::default();
            let (narrow, wide) = if bw_a <= bw_b { (bw_a, bw_b) } else { (bw_b, bw_a) };
            prop_assert!(
                scorer.score_metrics(3.0, wide, 40.0, 2)
                    >= scorer.score_metrics(3.0, narrow, 40.0, 2)
            );
        }
    }
}
