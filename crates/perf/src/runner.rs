//! Benchmark runner
//!
//! One execution context and one set of buffers serve every batch size. Each
//! batch size gets a fresh stream, a profile and shape binding, a warm-up
//! phase, then a timed loop where every execution is bracketed by two events
//! and synchronized before the next one is dispatched.

use std::time::{Duration, Instant};

use enginebench_runtime::{
    tensor::i32_to_bytes, Device, DeviceBuffer, Engine, ExecutionContext, Runtime, BERT_INPUT_BINDINGS,
    BERT_OUTPUT_BINDING,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::config::BenchmarkConfig;
use crate::error::{BenchError, Result};
use crate::inputs::SyntheticInputs;
use crate::report::{BatchResult, BenchmarkReport};
use crate::stats::LatencyStats;

/// Timed-loop condition: keep going until the target iteration count is
/// reached and the minimum duration has elapsed.
pub fn should_continue(iterations: usize, target: usize, elapsed: Duration, min_duration: Duration) -> bool {
    iterations < target || elapsed < min_duration
}

/// Input shapes for one batch size, in binding order
pub fn batch_shapes(sequence_length: usize, batch_size: usize) -> [(&'static str, Vec<usize>); 4] {
    [
        ("input_ids", vec![sequence_length * batch_size]),
        ("segment_ids", vec![sequence_length * batch_size]),
        ("cu_seqlens", vec![batch_size + 1]),
        ("max_seqlen", vec![sequence_length]),
    ]
}

/// Benchmark runner over a device
pub struct BenchmarkRunner<'d, D: Device> {
    device: &'d D,
    runtime: Runtime,
    config: BenchmarkConfig,
    show_progress: bool,
}

impl<'d, D: Device> BenchmarkRunner<'d, D> {
    pub fn new(device: &'d D, runtime: Runtime, config: BenchmarkConfig) -> Self {
        Self {
            device,
            runtime,
            config,
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr during timed loops
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run every batch size and return the report.
    ///
    /// Any error aborts the whole run; results of batch sizes that already
    /// finished are discarded. Device buffers are released on every path.
    pub fn run(&self) -> Result<BenchmarkReport> {
        self.config.validate()?;
        let batch_sizes = self.config.sorted_batch_sizes();
        let max_batch = self.config.max_batch_size();
        let seq = self.config.sequence_length;

        let blob = std::fs::read(&self.config.engine).map_err(|source| BenchError::EngineUnreadable {
            path: self.config.engine.clone(),
            source,
        })?;
        let engine = self.runtime.deserialize_engine(&blob)?;
        info!(
            engine = %self.config.engine.display(),
            device = %self.device.name(),
            profiles = engine.num_profiles(),
            "Loaded engine"
        );

        let mut context = engine.create_execution_context();
        let mut buffers = allocate_buffers(self.device, &engine, seq, max_batch)?;

        let inputs = SyntheticInputs::generate(seq, max_batch, self.config.random_seed)?;
        buffers[binding_index(&engine, "input_ids")?].upload(self.device, &i32_to_bytes(&inputs.word_ids))?;
        buffers[binding_index(&engine, "segment_ids")?].upload(self.device, &i32_to_bytes(&inputs.segment_ids))?;
        buffers[binding_index(&engine, "cu_seqlens")?].upload(self.device, &i32_to_bytes(&inputs.cu_seqlens))?;

        let mut results = Vec::with_capacity(batch_sizes.len());
        for (position, &batch_size) in batch_sizes.iter().enumerate() {
            let samples = self.benchmark_batch(&engine, &mut context, &mut buffers, position, batch_size)?;
            let stats = LatencyStats::from_samples(&samples)
                .ok_or_else(|| BenchError::InvalidConfig("timed loop produced no samples".into()))?;
            info!(
                batch_size,
                iterations = stats.iterations,
                average_ms = stats.average_ms,
                "Finished batch size"
            );
            results.push(BatchResult { batch_size, stats });
        }

        let released: usize = buffers.iter().map(|b| b.size_bytes()).sum();
        drop(buffers);
        debug!(bytes = released, "Released device buffers");

        Ok(BenchmarkReport::new(
            &self.config,
            self.device.name(),
            results,
        ))
    }

    fn benchmark_batch(
        &self,
        engine: &Engine,
        context: &mut ExecutionContext<'_>,
        buffers: &mut [DeviceBuffer<D::Memory>],
        position: usize,
        batch_size: usize,
    ) -> Result<Vec<f64>> {
        let device = self.device;
        let stream = device.create_stream()?;
        let shapes = batch_shapes(self.config.sequence_length, batch_size);

        let profile = select_profile(engine, &shapes, position);
        context.set_optimization_profile(profile)?;
        debug!(batch_size, profile, "Selected optimization profile");

        for (name, shape) in &shapes {
            context.set_input_shape(name, shape)?;
        }
        let unresolved = context.infer_shapes();
        if !unresolved.is_empty() {
            return Err(BenchError::UnresolvedShapes {
                batch_size,
                bindings: unresolved,
            });
        }

        for _ in 0..self.config.warm_up_runs {
            context.execute_async(device, buffers, &stream)?;
            device.synchronize(&stream)?;
        }

        let progress = self.progress_bar(batch_size);
        let mut start = device.create_event()?;
        let mut end = device.create_event()?;
        let mut samples = Vec::with_capacity(self.config.iterations);
        let min_duration = self.config.min_duration();
        let loop_start = Instant::now();

        while should_continue(samples.len(), self.config.iterations, loop_start.elapsed(), min_duration) {
            device.record_event(&mut start, &stream)?;
            context.execute_async(device, buffers, &stream)?;
            device.record_event(&mut end, &stream)?;
            device.synchronize(&stream)?;
            samples.push(device.elapsed_ms(&start, &end)? as f64);

            if samples.len() as u64 > progress.length().unwrap_or(0) {
                progress.set_length(samples.len() as u64);
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(samples)
    }

    fn progress_bar(&self, batch_size: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(self.config.iterations as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} batch {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        progress.set_style(style);
        progress.set_message(batch_size.to_string());
        progress
    }
}

/// Profile for a batch size: the first profile whose ranges accept every
/// input shape. When none does, the positional profile (or 0) is used and the
/// shape binding that follows reports the mismatch.
fn select_profile(engine: &Engine, shapes: &[(&'static str, Vec<usize>)], position: usize) -> usize {
    (0..engine.num_profiles())
        .find(|&i| {
            engine.profile(i).is_some_and(|p| {
                shapes
                    .iter()
                    .all(|(name, shape)| p.shapes.get(*name).map_or(true, |r| r.contains(shape)))
            })
        })
        .unwrap_or(if position < engine.num_profiles() { position } else { 0 })
}

fn binding_index(engine: &Engine, name: &str) -> Result<usize> {
    engine
        .binding_index(name)
        .ok_or_else(|| BenchError::MissingBinding(name.to_string()))
}

/// Elementwise maximum over every profile's `max` shape for an input
fn largest_profile_shape(engine: &Engine, name: &str) -> Option<Vec<usize>> {
    let mut largest: Option<Vec<usize>> = None;
    for index in 0..engine.num_profiles() {
        let max = &engine.profile(index)?.shapes.get(name)?.max;
        largest = Some(match largest {
            Some(current) => current.iter().zip(max).map(|(&a, &b)| a.max(b)).collect(),
            None => max.clone(),
        });
    }
    largest
}

/// One buffer per engine binding, in binding order, sized for the largest batch
fn allocate_buffers<D: Device>(
    device: &D,
    engine: &Engine,
    sequence_length: usize,
    max_batch: usize,
) -> Result<Vec<DeviceBuffer<D::Memory>>> {
    for name in BERT_INPUT_BINDINGS.iter().chain(std::iter::once(&BERT_OUTPUT_BINDING)) {
        binding_index(engine, name)?;
    }

    let max_tokens = sequence_length
        .checked_mul(max_batch)
        .ok_or_else(|| BenchError::InvalidConfig("buffer size overflows usize".into()))?;
    let mut buffers = Vec::with_capacity(engine.num_bindings());
    for binding in engine.bindings() {
        let shape = match binding.name.as_str() {
            "input_ids" | "segment_ids" => vec![max_tokens],
            "cu_seqlens" => vec![max_batch + 1],
            "max_seqlen" => vec![sequence_length],
            name if name == BERT_OUTPUT_BINDING => vec![max_tokens, 2, 1, 1],
            _ if binding.is_input => largest_profile_shape(engine, &binding.name)
                .ok_or_else(|| BenchError::UnexpectedBinding(binding.name.clone()))?,
            other => return Err(BenchError::UnexpectedBinding(other.to_string())),
        };
        buffers.push(DeviceBuffer::new(device, shape, binding.dtype)?);
    }
    Ok(buffers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use enginebench_runtime::{format, DType, EngineBuilder, LoggerConfig};

    fn engine(batch_sizes: &[usize]) -> Engine {
        let manifest = EngineBuilder::bert_varseqlen(8, batch_sizes, DType::F32).unwrap();
        Runtime::new(LoggerConfig::default())
            .deserialize_engine(&format::encode(&manifest).unwrap())
            .unwrap()
    }

    #[test]
    fn test_should_continue_iterations_only() {
        let zero = Duration::ZERO;
        assert!(should_continue(0, 50, zero, zero));
        assert!(should_continue(49, 50, Duration::from_secs(10), zero));
        assert!(!should_continue(50, 50, Duration::from_secs(10), zero));
    }

    #[test]
    fn test_should_continue_until_duration() {
        let min = Duration::from_secs(1);
        assert!(should_continue(50, 50, Duration::from_millis(999), min));
        assert!(should_continue(1000, 50, Duration::from_millis(10), min));
        assert!(!should_continue(50, 50, Duration::from_secs(1), min));
        // Iteration target still applies once the duration is met
        assert!(should_continue(10, 50, Duration::from_secs(5), min));
    }

    #[test]
    fn test_batch_shapes() {
        let shapes = batch_shapes(128, 4);
        assert_eq!(shapes[0], ("input_ids", vec![512]));
        assert_eq!(shapes[2], ("cu_seqlens", vec![5]));
        assert_eq!(shapes[3], ("max_seqlen", vec![128]));
    }

    #[test]
    fn test_select_profile_per_batch_size() {
        let engine = engine(&[1, 2, 4]);
        assert_eq!(select_profile(&engine, &batch_shapes(8, 1), 0), 0);
        assert_eq!(select_profile(&engine, &batch_shapes(8, 2), 1), 1);
        assert_eq!(select_profile(&engine, &batch_shapes(8, 4), 2), 2);
        // Benchmarking a subset still lands on the matching profile
        assert_eq!(select_profile(&engine, &batch_shapes(8, 4), 0), 2);
    }

    #[test]
    fn test_select_profile_single_profile_engine() {
        let engine = engine(&[4]);
        assert_eq!(select_profile(&engine, &batch_shapes(8, 1), 0), 0);
        assert_eq!(select_profile(&engine, &batch_shapes(8, 3), 1), 0);
        // Too large for any profile: fall back and let shape binding fail
        assert_eq!(select_profile(&engine, &batch_shapes(8, 8), 1), 0);
    }

    #[test]
    fn test_allocate_buffers_sizes() {
        let device = enginebench_runtime::HostDevice::new();
        let engine = engine(&[1, 2]);
        let buffers = allocate_buffers(&device, &engine, 8, 2).unwrap();
        let sizes: Vec<usize> = buffers.iter().map(|b| b.size_bytes()).collect();
        assert_eq!(sizes, vec![64, 64, 12, 32, 128]);
        drop(buffers);
        assert_eq!(device.live_bytes(), 0);
    }
}
