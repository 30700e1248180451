//! enginebench perf
//!
//! Latency benchmark for variable sequence length BERT engines. The runner
//! loads an engine, allocates buffers for the largest requested batch, fills
//! them with seeded synthetic tokens, and times repeated executions for each
//! batch size in ascending order.

mod config;
mod error;
mod inputs;
mod report;
mod runner;
mod stats;

pub use config::{
    BenchmarkConfig, DEFAULT_BATCH_SIZE, DEFAULT_DURATION_SECS, DEFAULT_ITERATIONS, DEFAULT_RANDOM_SEED,
    DEFAULT_SEQUENCE_LENGTH, DEFAULT_WARM_UP_RUNS,
};
pub use error::{BenchError, Result};
pub use inputs::{SyntheticInputs, PSEUDO_TYPE_VOCAB_SIZE, PSEUDO_VOCAB_SIZE};
pub use report::{BatchResult, BenchmarkReport};
pub use runner::{batch_shapes, should_continue, BenchmarkRunner};
pub use stats::{percentile_index, LatencyStats};
