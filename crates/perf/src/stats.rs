//! Latency statistics over timed samples

use serde::{Deserialize, Serialize};

/// Nearest-rank index `floor(p * n)`, zero-based and clamped to the last sample
pub fn percentile_index(n: usize, p: f64) -> usize {
    let idx = (n as f64 * p).floor() as usize;
    idx.min(n.saturating_sub(1))
}

/// Summary of one batch size's timed samples, all in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub iterations: usize,
    pub total_ms: f64,
    pub average_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub median_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    /// Compute statistics; `None` when there are no samples
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let n = samples.len();
        let total: f64 = samples.iter().sum();

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Some(Self {
            iterations: n,
            total_ms: total,
            average_ms: total / n as f64,
            p95_ms: sorted[percentile_index(n, 0.95)],
            p99_ms: sorted[percentile_index(n, 0.99)],
            min_ms: sorted[0],
            median_ms: sorted[percentile_index(n, 0.5)],
            max_ms: sorted[n - 1],
        })
    }

    /// Sample at an arbitrary nearest-rank percentile (`p` in `[0, 1]`)
    pub fn percentile_of(samples: &[f64], p: f64) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Some(sorted[percentile_index(sorted.len(), p)])
    }
}
