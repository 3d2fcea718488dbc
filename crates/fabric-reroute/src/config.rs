//! Engine configuration
//!
//! Every knob has a documented default; a config file only needs to name
//! the values it changes.

use crate::{RerouteError, Result};
use serde::{Deserialize, Serialize};

/// Default maximum hop count for route enumeration
pub const DEFAULT_MAX_HOPS: usize = 4;

/// Default number of recent decisions surfaced in statistics
pub const DEFAULT_RECENT_DECISIONS: usize = 5;

/// Default multiplicative improvement bar for congestion reroutes
pub const DEFAULT_CONGESTION_MARGIN: f64 = 1.10;

/// Link thresholds for bottleneck detection (strict greater-than)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BottleneckThresholds {
    pub utilization_pct: f64,
    pub latency_ms: f64,
    pub error_rate_pct: f64,
}

impl Default for BottleneckThresholds {
    fn default() -> Self {
        Self {
            utilization_pct: 85.0,
            latency_ms: 10.0,
            error_rate_pct: 5.0,
        }
    }
}

/// Route scoring weights
///
/// `latency + bandwidth + utilization` form the normalized budget;
/// `hop_bonus` is added on top of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub latency: f64,
    pub bandwidth: f64,
    pub utilization: f64,
    pub hop_bonus: f64,
    /// Latency at which the latency sub-score reaches zero
    pub latency_ceiling_ms: f64,
    /// Bandwidth at which the bandwidth sub-score saturates
    pub bandwidth_reference_gbps: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            latency: 0.4,
            bandwidth: 0.3,
            utilization: 0.3,
            hop_bonus: 0.1,
            latency_ceiling_ms: 20.0,
            bandwidth_reference_gbps: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_hops: usize,
    pub recent_decisions: usize,
    pub congestion_margin: f64,
    pub thresholds: BottleneckThresholds,
    pub weights: ScoreWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            recent_decisions: DEFAULT_RECENT_DECISIONS,
            congestion_margin: DEFAULT_CONGESTION_MARGIN,
            thresholds: BottleneckThresholds::default(),
            weights: ScoreWeights::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_hops == 0 {
            return Err(RerouteError::InvalidConfig(
                "max_hops must be at least 1".to_string(),
            ));
        }

        if !self.congestion_margin.is_finite() || self.congestion_margin < 1.0 {
            return Err(RerouteError::InvalidConfig(format!(
                "congestion_margin {} must be >= 1.0",
                self.congestion_margin
            )));
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("thresholds.utilization_pct", t.utilization_pct),
            ("thresholds.latency_ms", t.latency_ms),
            ("thresholds.error_rate_pct", t.error_rate_pct),
        ] {
            check_non_negative(name, value)?;
        }

        let w = &self.weights;
        for (name, value) in [
            ("weights.latency", w.latency),
            ("weights.bandwidth", w.bandwidth),
            ("weights.utilization", w.utilization),
            ("weights.hop_bonus", w.hop_bonus),
        ] {
            check_non_negative(name, value)?;
        }

        if !is_positive(w.latency_ceiling_ms) || !is_positive(w.bandwidth_reference_gbps) {
            return Err(RerouteError::InvalidConfig(
                "normalization constants must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RerouteError::InvalidConfig(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )))
    }
}
