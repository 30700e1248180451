//! enginebench seq2seq
//!
//! Generic export-and-run harness for generative networks. A network plugs in
//! by describing itself with a [`ModelTrtConfig`] and the [`ModelClasses`] it
//! exports; [`Seq2SeqTrt`] then handles argument parsing, engine export,
//! greedy generation and timing.
//!
//! The GPT-2 adapter lives in [`gpt2`].

mod args;
mod config;
mod error;
mod export;
pub mod gpt2;
mod inference;
mod results;
mod runner;

pub use args::Seq2SeqArgs;
pub use config::{ExportedModule, ModelClasses, ModelTrtConfig, ModuleKind, Precision, VariantSpec};
pub use error::{Result, Seq2SeqError};
pub use export::{engine_path, export_module, remove_exports, ExportedEngine};
pub use inference::{DecoderSession, Generation};
pub use results::{NetworkResult, NetworkRuntime};
pub use runner::{generate_prompt, Seq2SeqTrt};
