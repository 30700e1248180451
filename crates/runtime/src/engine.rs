//! Deserialized engines: bindings, optimization profiles and engine kinds

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::error::{Result, RuntimeError};
use crate::logger::{LoggerConfig, Severity};
use crate::tensor::DYNAMIC_DIM;

/// Computation an engine performs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineKind {
    /// Packed variable sequence length BERT with a SQuAD span head.
    ///
    /// Inputs: `input_ids`, `segment_ids` (total tokens), `cu_seqlens`
    /// (batch + 1 prefix offsets), `max_seqlen` (its shape carries the maximum
    /// sequence length). Output: start/end logits per token.
    BertVarSeqLen,
    /// Autoregressive decoder producing next-token logits for each row
    Decoder { vocab_size: usize },
}

/// Named engine slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDesc {
    pub name: String,
    pub dtype: crate::tensor::DType,
    /// Declared dimensions, `DYNAMIC_DIM` for runtime-resolved ones
    pub dims: Vec<i64>,
    pub is_input: bool,
}

/// Legal shape range for one dynamic input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeRange {
    pub min: Vec<usize>,
    pub opt: Vec<usize>,
    pub max: Vec<usize>,
}

impl ShapeRange {
    pub fn new(min: Vec<usize>, opt: Vec<usize>, max: Vec<usize>) -> Self {
        Self { min, opt, max }
    }

    /// Whether `shape` lies inside `[min, max]` in every dimension
    pub fn contains(&self, shape: &[usize]) -> bool {
        shape.len() == self.min.len()
            && shape.len() == self.max.len()
            && shape
                .iter()
                .zip(self.min.iter().zip(&self.max))
                .all(|(&d, (&lo, &hi))| d >= lo && d <= hi)
    }
}

/// Shape ranges negotiated at build time, keyed by input binding name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationProfile {
    pub shapes: BTreeMap<String, ShapeRange>,
}

/// Everything a serialized engine carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineManifest {
    pub name: String,
    pub kind: EngineKind,
    pub bindings: Vec<BindingDesc>,
    pub profiles: Vec<OptimizationProfile>,
}

impl EngineManifest {
    /// Check the invariants every later stage relies on.
    ///
    /// Bindings are uniquely named and include at least one input. Every
    /// profile covers exactly the inputs, with ranges of the right rank,
    /// `min <= opt <= max`, and fixed dimensions pinned to their value.
    /// Decoder engines have a non-empty vocabulary.
    pub fn validate(&self) -> Result<()> {
        if let EngineKind::Decoder { vocab_size: 0 } = self.kind {
            return Err(RuntimeError::InvalidEngine(format!(
                "decoder engine {} has an empty vocabulary",
                self.name
            )));
        }
        if self.bindings.iter().all(|b| !b.is_input) {
            return Err(RuntimeError::InvalidEngine(format!("engine {} has no inputs", self.name)));
        }
        if self.profiles.is_empty() {
            return Err(RuntimeError::InvalidEngine(format!(
                "engine {} has no optimization profiles",
                self.name
            )));
        }
        for (i, binding) in self.bindings.iter().enumerate() {
            if self.bindings[..i].iter().any(|b| b.name == binding.name) {
                return Err(RuntimeError::InvalidEngine(format!("duplicate binding {}", binding.name)));
            }
        }

        for (index, profile) in self.profiles.iter().enumerate() {
            for binding in self.bindings.iter().filter(|b| b.is_input) {
                let range = profile.shapes.get(&binding.name).ok_or_else(|| {
                    RuntimeError::InvalidEngine(format!(
                        "profile {} does not cover input {}",
                        index, binding.name
                    ))
                })?;
                check_range(&binding.name, &binding.dims, range, index)?;
            }
            if let Some(name) = profile
                .shapes
                .keys()
                .find(|name| !self.bindings.iter().any(|b| b.is_input && &b.name == *name))
            {
                return Err(RuntimeError::InvalidEngine(format!(
                    "profile {} names unknown input {}",
                    index, name
                )));
            }
        }
        Ok(())
    }
}

fn check_range(name: &str, dims: &[i64], range: &ShapeRange, profile: usize) -> Result<()> {
    let rank = dims.len();
    for shape in [&range.min, &range.opt, &range.max] {
        if shape.len() != rank {
            return Err(RuntimeError::RankMismatch {
                name: name.to_string(),
                expected: rank,
                got: shape.len(),
            });
        }
    }
    for d in 0..rank {
        let (lo, opt, hi) = (range.min[d], range.opt[d], range.max[d]);
        if !(lo <= opt && opt <= hi) {
            return Err(RuntimeError::InvalidEngine(format!(
                "profile {} range for {} is not ordered in dimension {}",
                profile, name, d
            )));
        }
        if dims[d] != DYNAMIC_DIM && (lo as i64 != dims[d] || hi as i64 != dims[d]) {
            return Err(RuntimeError::InvalidEngine(format!(
                "profile {} range for {} changes fixed dimension {}",
                profile, name, d
            )));
        }
    }
    Ok(())
}

/// A deserialized engine
#[derive(Debug, Clone)]
pub struct Engine {
    manifest: EngineManifest,
    logger: LoggerConfig,
}

impl Engine {
    pub(crate) fn new(manifest: EngineManifest, logger: LoggerConfig) -> Self {
        Self { manifest, logger }
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn kind(&self) -> &EngineKind {
        &self.manifest.kind
    }

    pub fn manifest(&self) -> &EngineManifest {
        &self.manifest
    }

    pub fn bindings(&self) -> &[BindingDesc] {
        &self.manifest.bindings
    }

    pub fn num_bindings(&self) -> usize {
        self.manifest.bindings.len()
    }

    pub fn binding_index(&self, name: &str) -> Option<usize> {
        self.manifest.bindings.iter().position(|b| b.name == name)
    }

    pub fn binding(&self, name: &str) -> Option<&BindingDesc> {
        self.manifest.bindings.iter().find(|b| b.name == name)
    }

    pub fn num_profiles(&self) -> usize {
        self.manifest.profiles.len()
    }

    pub fn profile(&self, index: usize) -> Option<&OptimizationProfile> {
        self.manifest.profiles.get(index)
    }

    pub(crate) fn logger(&self) -> &LoggerConfig {
        &self.logger
    }

    /// Create an execution context with profile 0 selected
    pub fn create_execution_context(&self) -> ExecutionContext<'_> {
        self.logger.log(
            Severity::Verbose,
            &format!("Creating execution context for engine {}", self.manifest.name),
        );
        ExecutionContext::new(self)
    }
}
