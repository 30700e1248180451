//! Benchmark report

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BenchmarkConfig;
use crate::error::Result;
use crate::stats::LatencyStats;

/// Result for one batch size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_size: usize,
    #[serde(flatten)]
    pub stats: LatencyStats,
}

impl BatchResult {
    /// Human readable summary line
    pub fn report_line(&self) -> String {
        format!(
            "Running {} iterations with Batch Size: {}\tTotal Time: {} ms\tAverage Time: {} ms\t95th Percentile Time: {} ms\t99th Percentile Time: {} ms",
            self.stats.iterations,
            self.batch_size,
            self.stats.total_ms,
            self.stats.average_ms,
            self.stats.p95_ms,
            self.stats.p99_ms,
        )
    }
}

/// Complete benchmark report, batch sizes ascending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub engine: String,
    pub device: String,
    pub timestamp: DateTime<Utc>,
    pub config: BenchmarkConfig,
    pub results: Vec<BatchResult>,
}

impl BenchmarkReport {
    pub fn new(config: &BenchmarkConfig, device: String, results: Vec<BatchResult>) -> Self {
        Self {
            engine: config.engine.display().to_string(),
            device,
            timestamp: Utc::now(),
            config: config.clone(),
            results,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.results.iter().map(BatchResult::report_line).collect()
    }

    /// Print one line per batch size to stdout
    pub fn print(&self) {
        for line in self.lines() {
            println!("{}", line);
        }
    }

    /// Save to JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
