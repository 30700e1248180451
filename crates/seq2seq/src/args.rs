//! Arguments shared by every network entry point

use std::path::PathBuf;

use clap::Parser;

use crate::error::{Result, Seq2SeqError};

/// Base runner arguments
#[derive(Debug, Clone, Parser)]
pub struct Seq2SeqArgs {
    /// Network variant to run (defaults to the first variant)
    #[arg(short = 'm', long)]
    pub variant: Option<String>,

    /// Directory that exported engines are written to
    #[arg(long, default_value = "temp")]
    pub working_dir: PathBuf,

    /// Rows generated together
    #[arg(short, long, default_value_t = 1)]
    pub batch_size: usize,

    /// Prompt length in tokens
    #[arg(long, default_value_t = 16)]
    pub input_seq_len: usize,

    /// Tokens to generate after the prompt
    #[arg(long, default_value_t = 32)]
    pub output_seq_len: usize,

    /// Minimum number of timed generations
    #[arg(short, long, default_value_t = 10)]
    pub iterations: usize,

    /// Untimed generations before timing starts
    #[arg(short, long, default_value_t = 3)]
    pub warm_up: usize,

    /// Minimum timed duration in seconds
    #[arg(short, long, default_value_t = 0.0)]
    pub duration: f64,

    /// Latency percentile to report
    #[arg(short, long, default_value_t = 50)]
    pub percentile: u8,

    /// Export engines with half precision logits
    #[arg(long)]
    pub fp16: bool,

    /// Remove exported engines after the run
    #[arg(long)]
    pub cleanup: bool,

    /// Prompt generator seed
    #[arg(short = 'r', long, default_value_t = 12345)]
    pub seed: u64,
}

impl Default for Seq2SeqArgs {
    fn default() -> Self {
        Self {
            variant: None,
            working_dir: PathBuf::from("temp"),
            batch_size: 1,
            input_seq_len: 16,
            output_seq_len: 32,
            iterations: 10,
            warm_up: 3,
            duration: 0.0,
            percentile: 50,
            fp16: false,
            cleanup: false,
            seed: 12345,
        }
    }
}

impl Seq2SeqArgs {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("batch size", self.batch_size),
            ("input sequence length", self.input_seq_len),
            ("output sequence length", self.output_seq_len),
            ("iterations", self.iterations),
        ];
        for (what, value) in positive {
            if value == 0 {
                return Err(Seq2SeqError::InvalidArgs(format!("{} must be positive", what)));
            }
        }
        if self.percentile > 100 {
            return Err(Seq2SeqError::InvalidArgs(format!(
                "percentile must be within 0..=100, got {}",
                self.percentile
            )));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(Seq2SeqError::InvalidArgs(format!(
                "duration must be a non-negative number of seconds, got {}",
                self.duration
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_match_default() {
        let parsed = Seq2SeqArgs::try_parse_from(["gpt2-trt"]).unwrap();
        let default = Seq2SeqArgs::default();
        assert_eq!(parsed.working_dir, default.working_dir);
        assert_eq!(parsed.batch_size, default.batch_size);
        assert_eq!(parsed.output_seq_len, default.output_seq_len);
        assert_eq!(parsed.percentile, default.percentile);
        assert_eq!(parsed.seed, default.seed);
        assert!(parsed.variant.is_none());
    }

    #[test]
    fn test_parse_flags() {
        let parsed = Seq2SeqArgs::try_parse_from([
            "gpt2-trt",
            "--variant",
            "gpt2-medium",
            "--batch-size",
            "4",
            "--fp16",
            "--cleanup",
            "--working-dir",
            "/tmp/engines",
        ])
        .unwrap();
        assert_eq!(parsed.variant.as_deref(), Some("gpt2-medium"));
        assert_eq!(parsed.batch_size, 4);
        assert!(parsed.fp16);
        assert!(parsed.cleanup);
        assert_eq!(parsed.working_dir, PathBuf::from("/tmp/engines"));
    }

    #[test]
    fn test_validate() {
        assert!(Seq2SeqArgs::default().validate().is_ok());

        let args = Seq2SeqArgs {
            percentile: 101,
            ..Default::default()
        };
        assert!(matches!(args.validate(), Err(Seq2SeqError::InvalidArgs(_))));

        let args = Seq2SeqArgs {
            output_seq_len: 0,
            ..Default::default()
        };
        assert!(args.validate().is_err());

        let args = Seq2SeqArgs {
            duration: f64::NAN,
            ..Default::default()
        };
        assert!(args.validate().is_err());
    }
}
