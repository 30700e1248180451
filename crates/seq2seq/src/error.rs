//! Seq2seq harness errors

use enginebench_runtime::RuntimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Seq2SeqError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Unknown variant {variant}, expected one of: {}", available.join(", "))]
    UnknownVariant { variant: String, available: Vec<String> },

    #[error("Network {0} exports no decoder module")]
    NoDecoder(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error(transparent)]
    Cli(#[from] clap::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Seq2SeqError>;
