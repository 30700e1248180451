//! Benchmark error types

use std::path::PathBuf;

use enginebench_runtime::RuntimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Cannot read engine {path}: {source}")]
    EngineUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Engine is missing binding {0}")]
    MissingBinding(String),

    #[error("Engine binding {0} is not part of a varseqlen BERT engine")]
    UnexpectedBinding(String),

    #[error("Shape resolution failed for batch size {batch_size}: unresolved bindings {bindings:?}")]
    UnresolvedShapes {
        batch_size: usize,
        bindings: Vec<String>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
