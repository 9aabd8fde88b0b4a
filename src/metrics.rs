//! Request statistics for the inference service.

use crate::types::prediction::{PredictionResult, RiskBucket};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept before the oldest half is discarded
const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Metrics collector shared by all request handlers
pub struct ServiceMetrics {
    /// Successful predictions
    pub predictions_served: AtomicU64,
    /// Predictions with `approved = true`
    pub approvals: AtomicU64,
    /// Requests rejected as client errors
    pub client_errors: AtomicU64,
    /// Requests the model failed to score
    pub server_errors: AtomicU64,
    by_bucket: RwLock<HashMap<RiskBucket, u64>>,
    errors_by_kind: RwLock<HashMap<&'static str, u64>>,
    /// Prediction latencies in microseconds
    latencies: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            approvals: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            by_bucket: RwLock::new(HashMap::new()),
            errors_by_kind: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a completed prediction
    pub fn record_prediction(&self, latency: Duration, result: &PredictionResult) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);
        if result.approved {
            self.approvals.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut by_bucket) = self.by_bucket.write() {
            *by_bucket.entry(result.risk_bucket).or_insert(0) += 1;
        }

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.push(latency.as_micros() as u64);
            if latencies.len() > MAX_LATENCY_SAMPLES {
                latencies.drain(0..MAX_LATENCY_SAMPLES / 2);
            }
        }
    }

    /// Record a request rejected as a client error
    pub fn record_client_error(&self, kind: &'static str) {
        self.client_errors.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut by_kind) = self.errors_by_kind.write() {
            *by_kind.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn record_server_error(&self) {
        self.server_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bucket_count(&self, bucket: RiskBucket) -> u64 {
        self.by_bucket
            .read()
            .ok()
            .and_then(|b| b.get(&bucket).copied())
            .unwrap_or(0)
    }

    pub fn error_count(&self, kind: &str) -> u64 {
        self.errors_by_kind
            .read()
            .ok()
            .and_then(|e| e.get(kind).copied())
            .unwrap_or(0)
    }

    /// Latency percentiles over the retained samples
    pub fn latency_stats(&self) -> LatencyStats {
        let Ok(latencies) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if latencies.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted = latencies.clone();
        sorted.sort_unstable();
        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Predictions per second since startup
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log a summary of everything recorded so far
    pub fn print_summary(&self) {
        let served = self.predictions_served.load(Ordering::Relaxed);
        let approvals = self.approvals.load(Ordering::Relaxed);
        let client_errors = self.client_errors.load(Ordering::Relaxed);
        let server_errors = self.server_errors.load(Ordering::Relaxed);
        let approval_rate = if served > 0 {
            approvals as f64 / served as f64 * 100.0
        } else {
            0.0
        };
        let latency = self.latency_stats();

        info!(
            served,
            approvals,
            approval_rate = format!("{:.1}%", approval_rate),
            client_errors,
            server_errors,
            throughput = format!("{:.1} req/s", self.throughput()),
            "Prediction summary"
        );
        info!(
            low = self.bucket_count(RiskBucket::Low),
            medium = self.bucket_count(RiskBucket::Medium),
            high = self.bucket_count(RiskBucket::High),
            "Risk bucket distribution"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Prediction latency"
        );
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
