//! Market-data call metrics
//!
//! Tracks latency percentiles and success rate of the provider calls made
//! by chunk workers. An empty answer counts as a failed call.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Snapshot of source call metrics
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMetrics {
    /// Name of the source
    pub source_name: String,
    /// 50th percentile latency of successful calls in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful calls in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of calls tracked
    pub total_requests: u64,
    /// Number of calls that returned nothing
    pub failed_requests: u64,
}

impl SourceMetrics {
    /// Creates metrics with no data
    pub fn empty(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            failed_requests: 0,
        }
    }
}

#[derive(Debug, Default)]
struct MetricsState {
    /// Latencies of recent successful calls
    latencies_ms: VecDeque<f64>,
    total: u64,
    failed: u64,
}

/// Collects call samples shared by all chunk workers
#[derive(Debug)]
pub struct MetricsCollector {
    source_name: String,
    state: Mutex<MetricsState>,
}

impl MetricsCollector {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            state: Mutex::new(MetricsState::default()),
        }
    }

    /// Records one call with its duration and outcome
    pub async fn record_request(&self, duration: Duration, success: bool) {
        let mut state = self.state.lock().await;
        state.total += 1;

        if !success {
            state.failed += 1;
            return;
        }

        if state.latencies_ms.len() >= MAX_SAMPLES {
            state.latencies_ms.pop_front();
        }
        state.latencies_ms.push_back(duration.as_secs_f64() * 1000.0);
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> SourceMetrics {
        let state = self.state.lock().await;

        if state.total == 0 {
            return SourceMetrics::empty(&self.source_name);
        }

        let mut latencies: Vec<f64> = state.latencies_ms.iter().copied().collect();
        latencies.sort_by(|a, b| a.total_cmp(b));

        SourceMetrics {
            source_name: self.source_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate: (state.total - state.failed) as f64 / state.total as f64,
            total_requests: state.total,
            failed_requests: state.failed,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
