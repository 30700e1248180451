//! Benchmark configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

pub const DEFAULT_BATCH_SIZE: usize = 1;
pub const DEFAULT_SEQUENCE_LENGTH: usize = 128;
pub const DEFAULT_ITERATIONS: usize = 200;
pub const DEFAULT_WARM_UP_RUNS: usize = 10;
pub const DEFAULT_DURATION_SECS: f64 = 0.0;
pub const DEFAULT_RANDOM_SEED: u64 = 12345;

/// Benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Serialized engine to benchmark
    pub engine: PathBuf,
    /// Batch sizes, in any order; duplicates collapse
    pub batch_sizes: Vec<usize>,
    pub sequence_length: usize,
    /// Timed iterations per batch size
    pub iterations: usize,
    /// Untimed iterations before each timed loop
    pub warm_up_runs: usize,
    /// Minimal wall-clock seconds per batch size
    pub duration_secs: f64,
    /// Seed for synthetic inputs
    pub random_seed: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            engine: PathBuf::new(),
            batch_sizes: vec![DEFAULT_BATCH_SIZE],
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            iterations: DEFAULT_ITERATIONS,
            warm_up_runs: DEFAULT_WARM_UP_RUNS,
            duration_secs: DEFAULT_DURATION_SECS,
            random_seed: DEFAULT_RANDOM_SEED,
        }
    }
}

impl BenchmarkConfig {
    pub fn new(engine: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.as_os_str().is_empty() {
            return Err(BenchError::InvalidConfig("engine path is required".into()));
        }
        if self.batch_sizes.iter().any(|&b| b == 0) {
            return Err(BenchError::InvalidConfig("batch sizes must be positive".into()));
        }
        if self.sequence_length == 0 {
            return Err(BenchError::InvalidConfig("sequence length must be positive".into()));
        }
        if self.iterations == 0 {
            return Err(BenchError::InvalidConfig("iterations must be positive".into()));
        }
        if self.warm_up_runs == 0 {
            return Err(BenchError::InvalidConfig("warm-up runs must be positive".into()));
        }
        self.max_tokens()?;
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err(BenchError::InvalidConfig(format!(
                "duration must be a non-negative number of seconds, got {}",
                self.duration_secs
            )));
        }
        Ok(())
    }

    /// Distinct batch sizes in ascending order; `[1]` when none were given
    pub fn sorted_batch_sizes(&self) -> Vec<usize> {
        if self.batch_sizes.is_empty() {
            return vec![DEFAULT_BATCH_SIZE];
        }
        let mut sizes = self.batch_sizes.clone();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }

    pub fn max_batch_size(&self) -> usize {
        self.batch_sizes.iter().copied().max().unwrap_or(DEFAULT_BATCH_SIZE)
    }

    /// Packed token count of the largest batch; token offsets are `i32` on
    /// the device, so the count must fit in one
    pub fn max_tokens(&self) -> Result<usize> {
        self.sequence_length
            .checked_mul(self.max_batch_size())
            .filter(|&t| i32::try_from(t).is_ok())
            .ok_or_else(|| {
                BenchError::InvalidConfig(format!(
                    "sequence length {} times batch size {} exceeds the i32 token range",
                    self.sequence_length,
                    self.max_batch_size()
                ))
            })
    }

    pub fn min_duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BenchmarkConfig::new("bert.engine");
        assert_eq!(config.batch_sizes, vec![1]);
        assert_eq!(config.sequence_length, 128);
        assert_eq!(config.iterations, 200);
        assert_eq!(config.warm_up_runs, 10);
        assert_eq!(config.duration_secs, 0.0);
        assert_eq!(config.random_seed, 12345);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sorted_batch_sizes() {
        let config = BenchmarkConfig {
            batch_sizes: vec![8, 1, 4, 1],
            ..BenchmarkConfig::new("bert.engine")
        };
        assert_eq!(config.sorted_batch_sizes(), vec![1, 4, 8]);
        assert_eq!(config.max_batch_size(), 8);

        let empty = BenchmarkConfig {
            batch_sizes: vec![],
            ..BenchmarkConfig::new("bert.engine")
        };
        assert_eq!(empty.sorted_batch_sizes(), vec![1]);
        assert_eq!(empty.max_batch_size(), 1);
    }

    #[test]
    fn test_validation() {
        let base = BenchmarkConfig::new("bert.engine");
        assert!(BenchmarkConfig { batch_sizes: vec![0], ..base.clone() }.validate().is_err());
        assert!(BenchmarkConfig { sequence_length: 0, ..base.clone() }.validate().is_err());
        assert!(BenchmarkConfig { iterations: 0, ..base.clone() }.validate().is_err());
        assert!(BenchmarkConfig { warm_up_runs: 0, ..base.clone() }.validate().is_err());
        assert!(BenchmarkConfig { duration_secs: -1.0, ..base.clone() }.validate().is_err());
        assert!(BenchmarkConfig { duration_secs: f64::NAN, ..base.clone() }.validate().is_err());
        assert!(BenchmarkConfig::default().validate().is_err());
    }

    #[test]
    fn test_token_count_overflow_rejected() {
        let base = BenchmarkConfig::new("bert.engine");
        let huge = BenchmarkConfig {
            sequence_length: usize::MAX,
            batch_sizes: vec![2],
            ..base.clone()
        };
        assert!(matches!(huge.validate(), Err(BenchError::InvalidConfig(_))));

        let past_i32 = BenchmarkConfig {
            sequence_length: 1 << 16,
            batch_sizes: vec![1, 1 << 15],
            ..base.clone()
        };
        assert!(past_i32.validate().is_err());

        let fits = BenchmarkConfig {
            sequence_length: 384,
            batch_sizes: vec![1, 128],
            ..base
        };
        assert_eq!(fits.max_tokens().unwrap(), 384 * 128);
    }

    #[test]
    fn test_min_duration() {
        let config = BenchmarkConfig {
            duration_secs: 1.5,
            ..BenchmarkConfig::new("bert.engine")
        };
        assert_eq!(config.min_duration(), Duration::from_millis(1500));
    }
}
