//! Execution contexts: profile selection, shape binding and dispatch

use std::collections::BTreeMap;

use crate::builder::{BERT_OUTPUT_BINDING, DECODER_INPUT_BINDING, DECODER_OUTPUT_BINDING};
use crate::device::{Device, DeviceBuffer, DeviceMemory};
use crate::engine::{BindingDesc, Engine, EngineKind};
use crate::error::{Result, RuntimeError};
use crate::kernels;
use crate::logger::Severity;
use crate::tensor::{bytes_to_i32, f32_to_bytes, is_dynamic, volume, DYNAMIC_DIM};

/// Per-run state over a shared [`Engine`]
#[derive(Debug)]
pub struct ExecutionContext<'e> {
    engine: &'e Engine,
    profile: usize,
    input_shapes: BTreeMap<String, Vec<usize>>,
}

impl<'e> ExecutionContext<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            profile: 0,
            input_shapes: BTreeMap::new(),
        }
    }

    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    pub fn active_profile(&self) -> usize {
        self.profile
    }

    /// Select the optimization profile used by later shape bindings.
    /// Input shapes bound under the previous profile are cleared.
    pub fn set_optimization_profile(&mut self, index: usize) -> Result<()> {
        let count = self.engine.num_profiles();
        if index >= count {
            return Err(RuntimeError::ProfileOutOfRange { index, count });
        }
        self.profile = index;
        self.input_shapes.clear();
        self.engine
            .logger()
            .log(Severity::Verbose, &format!("Selected optimization profile {}", index));
        Ok(())
    }

    /// Bind the runtime shape of an input
    pub fn set_input_shape(&mut self, name: &str, shape: &[usize]) -> Result<()> {
        let binding = self
            .engine
            .binding(name)
            .ok_or_else(|| RuntimeError::UnknownBinding(name.to_string()))?;
        if !binding.is_input {
            return Err(RuntimeError::NotAnInput(name.to_string()));
        }
        if shape.len() != binding.dims.len() {
            return Err(RuntimeError::RankMismatch {
                name: name.to_string(),
                expected: binding.dims.len(),
                got: shape.len(),
            });
        }

        let profile = self
            .engine
            .profile(self.profile)
            .ok_or(RuntimeError::ProfileOutOfRange {
                index: self.profile,
                count: self.engine.num_profiles(),
            })?;
        let range = profile.shapes.get(name).ok_or_else(|| {
            RuntimeError::InvalidEngine(format!("profile {} has no shape range for input {}", self.profile, name))
        })?;
        let fixed_ok = binding
            .dims
            .iter()
            .zip(shape)
            .all(|(&declared, &d)| declared == DYNAMIC_DIM || declared == d as i64);
        if !fixed_ok || !range.contains(shape) {
            self.engine.logger().log(
                Severity::Error,
                &format!("Shape {:?} rejected for binding {}", shape, name),
            );
            return Err(RuntimeError::ShapeOutOfRange {
                name: name.to_string(),
                shape: shape.to_vec(),
                profile: self.profile,
                min: range.min.clone(),
                max: range.max.clone(),
            });
        }

        self.input_shapes.insert(name.to_string(), shape.to_vec());
        Ok(())
    }

    /// Names of inputs whose shapes are still unresolved; empty once every
    /// dynamic input has been bound.
    pub fn infer_shapes(&self) -> Vec<String> {
        self.engine
            .bindings()
            .iter()
            .filter(|b| b.is_input && !self.input_shapes.contains_key(&b.name) && is_dynamic(&b.dims))
            .map(|b| b.name.clone())
            .collect()
    }

    /// Resolved shape of any binding.
    ///
    /// Dynamic output dimensions follow the same dimension of the first input.
    pub fn binding_shape(&self, name: &str) -> Result<Vec<usize>> {
        let binding = self
            .engine
            .binding(name)
            .ok_or_else(|| RuntimeError::UnknownBinding(name.to_string()))?;
        if binding.is_input {
            return self.input_shape(binding);
        }

        let first_input = self
            .engine
            .bindings()
            .iter()
            .find(|b| b.is_input)
            .ok_or_else(|| RuntimeError::InvalidEngine("engine has no inputs".into()))?;
        let reference = self.input_shape(first_input)?;
        binding
            .dims
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                if d == DYNAMIC_DIM {
                    reference
                        .get(i)
                        .copied()
                        .ok_or_else(|| RuntimeError::UnresolvedShapes(vec![name.to_string()]))
                } else {
                    Ok(d as usize)
                }
            })
            .collect()
    }

    fn input_shape(&self, binding: &BindingDesc) -> Result<Vec<usize>> {
        match self.input_shapes.get(&binding.name) {
            Some(shape) => Ok(shape.clone()),
            None if !binding.dims.contains(&DYNAMIC_DIM) => Ok(static_shape(binding)),
            None => Err(RuntimeError::UnresolvedShapes(vec![binding.name.clone()])),
        }
    }

    /// Dispatch one execution onto `stream`.
    ///
    /// `bindings` holds one buffer per engine binding, in binding order. The
    /// call returns once the work is queued; callers synchronize the stream
    /// before reading outputs.
    pub fn execute_async<D: Device>(
        &mut self,
        device: &D,
        bindings: &mut [DeviceBuffer<D::Memory>],
        _stream: &D::Stream,
    ) -> Result<()> {
        let unresolved = self.infer_shapes();
        if !unresolved.is_empty() {
            return Err(RuntimeError::UnresolvedShapes(unresolved));
        }
        if bindings.len() != self.engine.num_bindings() {
            return Err(RuntimeError::BindingCountMismatch {
                expected: self.engine.num_bindings(),
                got: bindings.len(),
            });
        }

        let mut shapes = Vec::with_capacity(bindings.len());
        for (desc, buffer) in self.engine.bindings().iter().zip(bindings.iter()) {
            let shape = self.binding_shape(&desc.name)?;
            let need = volume(&shape) * desc.dtype.size_bytes();
            if buffer.memory().size_bytes() < need {
                return Err(RuntimeError::BufferTooSmall {
                    name: desc.name.clone(),
                    need,
                    have: buffer.memory().size_bytes(),
                });
            }
            shapes.push(shape);
        }

        match self.engine.kind() {
            EngineKind::BertVarSeqLen => self.run_bert(device, bindings, &shapes),
            EngineKind::Decoder { vocab_size } => self.run_decoder(device, bindings, &shapes, *vocab_size),
        }
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.engine
            .binding_index(name)
            .ok_or_else(|| RuntimeError::UnknownBinding(name.to_string()))
    }

    fn read_i32<D: Device>(
        &self,
        device: &D,
        bindings: &[DeviceBuffer<D::Memory>],
        shapes: &[Vec<usize>],
        name: &str,
    ) -> Result<Vec<i32>> {
        let idx = self.index_of(name)?;
        let bytes = bindings[idx].download(device, volume(&shapes[idx]) * 4)?;
        Ok(bytes_to_i32(&bytes))
    }

    fn run_bert<D: Device>(
        &self,
        device: &D,
        bindings: &mut [DeviceBuffer<D::Memory>],
        shapes: &[Vec<usize>],
    ) -> Result<()> {
        let word_ids = self.read_i32(device, bindings, shapes, "input_ids")?;
        let segment_ids = self.read_i32(device, bindings, shapes, "segment_ids")?;
        let cu_seqlens = self.read_i32(device, bindings, shapes, "cu_seqlens")?;

        let logits = kernels::bert_squad_logits(&word_ids, &segment_ids, &cu_seqlens)?;
        let out = self.index_of(BERT_OUTPUT_BINDING)?;
        let dtype = self.engine.bindings()[out].dtype;
        bindings[out].upload(device, &f32_to_bytes(&logits, dtype))
    }

    fn run_decoder<D: Device>(
        &self,
        device: &D,
        bindings: &mut [DeviceBuffer<D::Memory>],
        shapes: &[Vec<usize>],
        vocab_size: usize,
    ) -> Result<()> {
        let idx = self.index_of(DECODER_INPUT_BINDING)?;
        let (batch, len) = match shapes[idx].as_slice() {
            [b, l] => (*b, *l),
            other => {
                return Err(RuntimeError::RankMismatch {
                    name: DECODER_INPUT_BINDING.to_string(),
                    expected: 2,
                    got: other.len(),
                })
            }
        };
        let ids = self.read_i32(device, bindings, shapes, DECODER_INPUT_BINDING)?;

        let logits = kernels::decoder_next_token_logits(&ids, batch, len, vocab_size)?;
        let out = self.index_of(DECODER_OUTPUT_BINDING)?;
        let dtype = self.engine.bindings()[out].dtype;
        bindings[out].upload(device, &f32_to_bytes(&logits, dtype))
    }
}

fn static_shape(binding: &BindingDesc) -> Vec<usize> {
    binding.dims.iter().map(|&d| d.max(0) as usize).collect()
}
