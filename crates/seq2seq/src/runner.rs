//! Generic network runner

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{CommandFactory, FromArgMatches};
use enginebench_perf::{should_continue, LatencyStats};
use enginebench_runtime::{Device, DeviceTask, Runtime, RuntimeSettings};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::info;

use crate::args::Seq2SeqArgs;
use crate::config::{ModelClasses, ModelTrtConfig, Precision, VariantSpec};
use crate::error::{Result, Seq2SeqError};
use crate::export::{export_module, remove_exports, ExportedEngine};
use crate::inference::{DecoderSession, Generation};
use crate::results::{NetworkResult, NetworkRuntime};

/// Seeded prompt of `batch_size` rows with `length` tokens below `vocab_size`
pub fn generate_prompt(seed: u64, batch_size: usize, length: usize, vocab_size: usize) -> Vec<Vec<u32>> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    (0..batch_size)
        .map(|_| (0..length).map(|_| rng.gen_range(0..vocab_size as u32)).collect())
        .collect()
}

/// Export-and-run harness for one network
#[derive(Debug, Clone, Copy)]
pub struct Seq2SeqTrt {
    pub config: &'static ModelTrtConfig,
    pub description: &'static str,
    pub model_classes: &'static ModelClasses,
}

struct RunTask<'a> {
    network: &'a Seq2SeqTrt,
    runtime: Runtime,
    args: &'a Seq2SeqArgs,
}

impl DeviceTask for RunTask<'_> {
    type Output = Result<NetworkResult>;

    fn run<D: Device>(self, device: &D) -> Self::Output {
        self.network.run_on(device, &self.runtime, self.args)
    }
}

struct Measurements {
    last: Generation,
    step_ms: Vec<f64>,
    full_ms: Vec<f64>,
}

impl Seq2SeqTrt {
    pub const fn new(config: &'static ModelTrtConfig, description: &'static str, model_classes: &'static ModelClasses) -> Self {
        Self {
            config,
            description,
            model_classes,
        }
    }

    /// Command line definition with this network's description
    pub fn command(&self) -> clap::Command {
        Seq2SeqArgs::command().about(self.description)
    }

    pub fn try_parse_args_from<I, T>(&self, args: I) -> Result<Seq2SeqArgs>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command().try_get_matches_from(args)?;
        Ok(Seq2SeqArgs::from_arg_matches(&matches)?)
    }

    /// Parse the process arguments and run on the device from the environment.
    ///
    /// Exits the process on `--help` or malformed arguments, like any clap
    /// binary.
    pub fn run(&self) -> Result<NetworkResult> {
        let matches = self.command().get_matches();
        let args = Seq2SeqArgs::from_arg_matches(&matches)?;
        self.run_with(args)
    }

    /// Run with explicit arguments on the device from the environment
    pub fn run_with(&self, args: Seq2SeqArgs) -> Result<NetworkResult> {
        let settings = RuntimeSettings::from_env();
        let task = RunTask {
            network: self,
            runtime: Runtime::new(settings.logger()),
            args: &args,
        };
        settings.dispatch(task)?
    }

    fn resolve_variant(&self, args: &Seq2SeqArgs) -> Result<&'static VariantSpec> {
        let config = self.config;
        match &args.variant {
            Some(name) => config.variant(name).ok_or_else(|| Seq2SeqError::UnknownVariant {
                variant: name.clone(),
                available: config.variant_names(),
            }),
            None => config
                .default_variant()
                .ok_or_else(|| Seq2SeqError::InvalidArgs(format!("{} defines no variants", config.network_name))),
        }
    }

    /// Run on an explicit device
    pub fn run_on<D: Device>(&self, device: &D, runtime: &Runtime, args: &Seq2SeqArgs) -> Result<NetworkResult> {
        args.validate()?;
        let variant = self.resolve_variant(args)?;
        if args.input_seq_len >= variant.max_length {
            return Err(Seq2SeqError::InvalidArgs(format!(
                "input sequence length {} must be below {}'s maximum length {}",
                args.input_seq_len, variant.name, variant.max_length
            )));
        }
        let decoder = self
            .model_classes
            .decoder()
            .ok_or_else(|| Seq2SeqError::NoDecoder(self.config.network_name.to_string()))?;

        let precision = Precision::from_fp16_flag(args.fp16);
        let mut exported = Vec::with_capacity(self.model_classes.modules.len());
        for module in self.model_classes.modules {
            exported.push(export_module(
                &args.working_dir,
                self.config,
                variant,
                module,
                args.batch_size,
                precision,
            )?);
        }

        let outcome = exported
            .iter()
            .find(|e| e.module == decoder.name)
            .ok_or_else(|| Seq2SeqError::NoDecoder(self.config.network_name.to_string()))
            .and_then(|engine| self.measure(device, runtime, args, variant, engine));

        if args.cleanup {
            remove_exports(&args.working_dir, &exported)?;
        }
        let (prompt, measurements) = outcome?;

        let p = args.percentile as f64 / 100.0;
        let mut runtimes = vec![];
        if let Some(ms) = LatencyStats::percentile_of(&measurements.step_ms, p) {
            runtimes.push(NetworkRuntime {
                name: decoder.name.to_string(),
                runtime_ms: ms,
            });
        }
        if let Some(ms) = LatencyStats::percentile_of(&measurements.full_ms, p) {
            runtimes.push(NetworkRuntime {
                name: "full".to_string(),
                runtime_ms: ms,
            });
        }

        Ok(NetworkResult {
            network: self.config.network_name.to_string(),
            variant: variant.name.to_string(),
            precision,
            batch_size: args.batch_size,
            percentile: args.percentile,
            input_tokens: prompt,
            output_tokens: measurements.last.tokens,
            iterations: measurements.full_ms.len(),
            runtimes,
            engines: exported.into_iter().map(|e| e.path).collect::<Vec<PathBuf>>(),
        })
    }

    fn measure<D: Device>(
        &self,
        device: &D,
        runtime: &Runtime,
        args: &Seq2SeqArgs,
        variant: &VariantSpec,
        exported: &ExportedEngine,
    ) -> Result<(Vec<Vec<u32>>, Measurements)> {
        let engine = runtime.load_engine_file(&exported.path)?;
        let mut session = DecoderSession::new(device, &engine, args.batch_size)?;
        let prompt = generate_prompt(args.seed, args.batch_size, args.input_seq_len, variant.vocab_size);

        for _ in 0..args.warm_up {
            session.generate(&prompt, args.output_seq_len, variant.eos_token_id)?;
        }

        let min_duration = Duration::from_secs_f64(args.duration);
        let mut step_ms = vec![];
        let mut full_ms = vec![];
        let mut last = None;
        let started = Instant::now();
        while should_continue(full_ms.len(), args.iterations, started.elapsed(), min_duration) {
            let generation = session.generate(&prompt, args.output_seq_len, variant.eos_token_id)?;
            step_ms.extend_from_slice(&generation.step_ms);
            full_ms.push(generation.total_ms);
            last = Some(generation);
        }

        // iterations is validated positive, so the loop ran at least once
        let last = last.ok_or_else(|| Seq2SeqError::InvalidArgs("no timed generations ran".into()))?;
        info!(
            network = self.config.network_name,
            variant = variant.name,
            iterations = full_ms.len(),
            generated = last.step_ms.len(),
            "Generation timing complete"
        );

        Ok((prompt, Measurements { last, step_ms, full_ms }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_seeded() {
        let a = generate_prompt(7, 2, 10, 50);
        let b = generate_prompt(7, 2, 10, 50);
        let c = generate_prompt(8, 2, 10, 50);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 2);
        assert!(a.iter().all(|row| row.len() == 10));
        assert!(a.iter().flatten().all(|&t| t < 50));
    }
}
