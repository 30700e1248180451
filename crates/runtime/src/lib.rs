//! enginebench runtime
//!
//! The inference runtime seam used by the benchmark and seq2seq tools.
//!
//! # Architecture
//!
//! - **Devices**: the [`Device`] trait covers memory, streams and timing events.
//!   [`HostDevice`] runs everything on host memory; `CudaGpu` (feature `cuda`)
//!   drives a real GPU through `cudarc`.
//! - **Engines**: a serialized engine is a checksummed manifest describing the
//!   bindings and optimization profiles of a network. [`Runtime`] deserializes
//!   it into an [`Engine`].
//! - **Execution contexts**: an [`ExecutionContext`] selects a profile, binds
//!   input shapes, resolves output shapes and dispatches executions onto a
//!   stream.
//!
//! Engine execution runs a small deterministic reference computation for each
//! [`EngineKind`]; it stands in for an optimized inference graph.

pub mod builder;
pub mod context;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod device;
pub mod engine;
pub mod error;
pub mod format;
pub mod host;
pub mod kernels;
pub mod logger;
pub mod runtime;
pub mod settings;
pub mod tensor;

pub use builder::{
    EngineBuilder, BERT_INPUT_BINDINGS, BERT_OUTPUT_BINDING, DECODER_INPUT_BINDING, DECODER_OUTPUT_BINDING,
};
pub use context::ExecutionContext;
#[cfg(feature = "cuda")]
pub use cuda::CudaGpu;
pub use device::{Device, DeviceBuffer, DeviceMemory};
pub use engine::{BindingDesc, Engine, EngineKind, EngineManifest, OptimizationProfile, ShapeRange};
pub use error::{Result, RuntimeError};
pub use host::HostDevice;
pub use logger::{LoggerConfig, Severity};
pub use runtime::Runtime;
pub use settings::{DeviceBackend, DeviceTask, RuntimeSettings};
pub use tensor::{volume, DType, DYNAMIC_DIM};
