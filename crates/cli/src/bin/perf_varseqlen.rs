//! Latency benchmark for variable sequence length BERT engines
//!
//! ```bash
//! perf-varseqlen -e bert_varseqlen.engine -b 1 -b 8 -b 32 -s 384 -i 500
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use enginebench_perf::{
    BenchmarkConfig, BenchmarkReport, BenchmarkRunner, DEFAULT_DURATION_SECS, DEFAULT_ITERATIONS,
    DEFAULT_RANDOM_SEED, DEFAULT_SEQUENCE_LENGTH, DEFAULT_WARM_UP_RUNS,
};
use enginebench_runtime::{Device, DeviceTask, Runtime, RuntimeSettings};

#[derive(Parser)]
#[command(name = "perf-varseqlen")]
#[command(version)]
#[command(about = "Measure inference latency of a variable sequence length BERT engine")]
struct Cli {
    /// Path to the serialized engine
    #[arg(short, long)]
    engine: PathBuf,

    /// Batch size to benchmark; repeat to run several
    #[arg(short, long, default_value = "1")]
    batch_size: Vec<usize>,

    /// Sequence length of every synthetic sequence
    #[arg(short, long, default_value_t = DEFAULT_SEQUENCE_LENGTH)]
    sequence_length: usize,

    /// Minimum number of timed iterations per batch size
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,

    /// Untimed executions before each batch size
    #[arg(short, long, default_value_t = DEFAULT_WARM_UP_RUNS)]
    warm_up_runs: usize,

    /// Minimum timed duration per batch size, in seconds
    #[arg(short, long, default_value_t = DEFAULT_DURATION_SECS)]
    duration: f64,

    /// Seed for the synthetic inputs
    #[arg(short, long, default_value_t = DEFAULT_RANDOM_SEED)]
    random_seed: u64,

    /// Also write the report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show a progress bar on stderr
    #[arg(long)]
    progress: bool,
}

struct Benchmark {
    runtime: Runtime,
    config: BenchmarkConfig,
    progress: bool,
}

impl DeviceTask for Benchmark {
    type Output = enginebench_perf::Result<BenchmarkReport>;

    fn run<D: Device>(self, device: &D) -> Self::Output {
        BenchmarkRunner::new(device, self.runtime, self.config)
            .with_progress(self.progress)
            .run()
    }
}

fn main() -> Result<()> {
    enginebench_cli::init_tracing();
    let cli = Cli::parse();

    let config = BenchmarkConfig {
        engine: cli.engine,
        batch_sizes: cli.batch_size,
        sequence_length: cli.sequence_length,
        iterations: cli.iterations,
        warm_up_runs: cli.warm_up_runs,
        duration_secs: cli.duration,
        random_seed: cli.random_seed,
    };

    let settings = RuntimeSettings::from_env();
    let task = Benchmark {
        runtime: Runtime::new(settings.logger()),
        config,
        progress: cli.progress,
    };
    let report = settings.dispatch(task)??;
    report.print();

    if let Some(path) = cli.output {
        report
            .save(&path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        eprintln!("{} Report saved to {}", style("[OK]").green().bold(), path.display());
    }
    Ok(())
}
