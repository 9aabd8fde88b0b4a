//! Prediction result data structures

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Three-level discretisation of the approval probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskBucket {
    Low,
    Medium,
    High,
}

impl RiskBucket {
    /// Determine the bucket from an approval probability.
    ///
    /// A high approval probability means low risk.
    pub fn from_probability(probability: f64, thresholds: &RiskBucketThresholds) -> Self {
        if probability >= thresholds.low {
            RiskBucket::Low
        } else if probability >= thresholds.medium {
            RiskBucket::Medium
        } else {
            RiskBucket::High
        }
    }
}

/// Lower probability bounds for the LOW and MEDIUM buckets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskBucketThresholds {
    pub low: f64,
    pub medium: f64,
}

impl Default for RiskBucketThresholds {
    fn default() -> Self {
        Self {
            low: 0.75,
            medium: 0.50,
        }
    }
}

impl RiskBucketThresholds {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.low) && (0.0..=1.0).contains(&self.medium),
            "risk bucket thresholds must be within [0, 1]"
        );
        ensure!(
            self.medium <= self.low,
            "medium cutoff ({}) must not exceed low cutoff ({})",
            self.medium,
            self.low
        );
        Ok(())
    }
}

/// Outcome of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Whether the probability clears the approval threshold
    pub approved: bool,
    /// Positive-class probability, rounded to 3 decimals
    pub probability: f64,
    /// Risk bucket derived from the unrounded probability
    pub risk_bucket: RiskBucket,
}

impl PredictionResult {
    /// Apply the decision rules to a raw model probability.
    ///
    /// Both the approval flag and the bucket are computed before rounding.
    pub fn from_probability(
        probability: f64,
        approval_threshold: f64,
        thresholds: &RiskBucketThresholds,
    ) -> Self {
        Self {
            approved: probability >= approval_threshold,
            probability: round_to(probability, 3),
            risk_bucket: RiskBucket::from_probability(probability, thresholds),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
