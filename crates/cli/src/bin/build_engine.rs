//! Write a reference variable sequence length BERT engine

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use enginebench_runtime::{format, DType, EngineBuilder};

#[derive(Parser)]
#[command(name = "build-engine")]
#[command(version)]
#[command(about = "Build a serialized BERT varseqlen engine with one optimization profile per batch size")]
struct Cli {
    /// Engine file to write
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum sequence length of every profile
    #[arg(short, long, default_value_t = 128)]
    sequence_length: usize,

    /// Batch size to build a profile for; repeat for several
    #[arg(short, long, default_value = "1")]
    batch_size: Vec<usize>,

    /// Emit half precision logits
    #[arg(long)]
    fp16: bool,
}

fn main() -> Result<()> {
    enginebench_cli::init_tracing();
    let cli = Cli::parse();

    let dtype = if cli.fp16 { DType::F16 } else { DType::F32 };
    let manifest = EngineBuilder::bert_varseqlen(cli.sequence_length, &cli.batch_size, dtype)?;
    let blob = format::encode(&manifest)?;
    std::fs::write(&cli.output, &blob).with_context(|| format!("failed to write {}", cli.output.display()))?;

    eprintln!(
        "{} Wrote {} ({} bytes, {} profiles)",
        style("[OK]").green().bold(),
        cli.output.display(),
        blob.len(),
        manifest.profiles.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from(["build-engine", "-o", "bert.engine", "-b", "8", "-b", "1", "--fp16"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("bert.engine"));
        assert_eq!(cli.batch_size, vec![8, 1]);
        assert_eq!(cli.sequence_length, 128);
        assert!(cli.fp16);

        let cli = Cli::try_parse_from(["build-engine", "-o", "bert.engine"]).unwrap();
        assert_eq!(cli.batch_size, vec![1]);
        assert!(Cli::try_parse_from(["build-engine"]).is_err());
    }
}
