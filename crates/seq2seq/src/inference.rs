//! Greedy generation on a decoder engine

use std::time::Instant;

use enginebench_runtime::kernels::argmax;
use enginebench_runtime::tensor::{bytes_to_f32, i32_to_bytes};
use enginebench_runtime::{
    DType, Device, DeviceBuffer, Engine, EngineKind, ExecutionContext, RuntimeError, DECODER_INPUT_BINDING,
    DECODER_OUTPUT_BINDING,
};
use tracing::trace;

use crate::error::{Result, Seq2SeqError};

/// Output of one full generation
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Generated tokens per row, excluding the prompt
    pub tokens: Vec<Vec<u32>>,
    /// Device time of each decoder step in milliseconds
    pub step_ms: Vec<f64>,
    /// Wall time of the whole generation in milliseconds
    pub total_ms: f64,
}

/// A decoder engine bound to buffers sized for its longest sequence
pub struct DecoderSession<'e, 'd, D: Device> {
    device: &'d D,
    context: ExecutionContext<'e>,
    bindings: Vec<DeviceBuffer<D::Memory>>,
    stream: D::Stream,
    start: D::Event,
    end: D::Event,
    batch_size: usize,
    max_length: usize,
    vocab_size: usize,
    input_index: usize,
    output_index: usize,
}

impl<'e, 'd, D: Device> DecoderSession<'e, 'd, D> {
    pub fn new(device: &'d D, engine: &'e Engine, batch_size: usize) -> Result<Self> {
        let vocab_size = match engine.kind() {
            EngineKind::Decoder { vocab_size } => *vocab_size,
            other => {
                return Err(RuntimeError::InvalidEngine(format!(
                    "engine {} is a {:?} engine, not a decoder",
                    engine.name(),
                    other
                ))
                .into())
            }
        };

        let range = engine
            .profile(0)
            .and_then(|p| p.shapes.get(DECODER_INPUT_BINDING))
            .ok_or_else(|| RuntimeError::InvalidEngine(format!("engine {} has no decoder profile", engine.name())))?;
        let (max_batch, max_length) = match range.max.as_slice() {
            [b, l] => (*b, *l),
            other => {
                return Err(RuntimeError::RankMismatch {
                    name: DECODER_INPUT_BINDING.to_string(),
                    expected: 2,
                    got: other.len(),
                }
                .into())
            }
        };
        if batch_size == 0 || batch_size > max_batch {
            return Err(Seq2SeqError::InvalidArgs(format!(
                "batch size {} outside engine range 1..={}",
                batch_size, max_batch
            )));
        }

        let input_index = engine
            .binding_index(DECODER_INPUT_BINDING)
            .ok_or_else(|| RuntimeError::UnknownBinding(DECODER_INPUT_BINDING.to_string()))?;
        let output_index = engine
            .binding_index(DECODER_OUTPUT_BINDING)
            .ok_or_else(|| RuntimeError::UnknownBinding(DECODER_OUTPUT_BINDING.to_string()))?;

        let mut context = engine.create_execution_context();
        context.set_optimization_profile(0)?;

        let mut bindings = Vec::with_capacity(engine.num_bindings());
        for (i, binding) in engine.bindings().iter().enumerate() {
            let buffer = if i == input_index {
                DeviceBuffer::new(device, vec![batch_size, max_length], DType::I32)?
            } else if i == output_index {
                DeviceBuffer::new(device, vec![batch_size, vocab_size], binding.dtype)?
            } else {
                return Err(RuntimeError::UnknownBinding(binding.name.clone()).into());
            };
            bindings.push(buffer);
        }

        Ok(Self {
            device,
            context,
            bindings,
            stream: device.create_stream()?,
            start: device.create_event()?,
            end: device.create_event()?,
            batch_size,
            max_length,
            vocab_size,
            input_index,
            output_index,
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// One decoder step over `ids` (`batch x len`, row-major): returns the
    /// argmax token of each row and the step's device time
    fn step(&mut self, ids: &[i32], len: usize) -> Result<(Vec<u32>, f64)> {
        self.bindings[self.input_index].upload(self.device, &i32_to_bytes(ids))?;
        self.context
            .set_input_shape(DECODER_INPUT_BINDING, &[self.batch_size, len])?;

        self.device.record_event(&mut self.start, &self.stream)?;
        self.context
            .execute_async(self.device, &mut self.bindings, &self.stream)?;
        self.device.record_event(&mut self.end, &self.stream)?;
        self.device.synchronize(&self.stream)?;
        let elapsed = self.device.elapsed_ms(&self.start, &self.end)? as f64;

        let output = &self.bindings[self.output_index];
        let bytes = output.download(self.device, self.batch_size * self.vocab_size * output.dtype.size_bytes())?;
        let logits = bytes_to_f32(&bytes, output.dtype);
        let next = logits
            .chunks(self.vocab_size)
            .map(|row| argmax(row) as u32)
            .collect();
        Ok((next, elapsed))
    }

    /// Greedily extend `prompt` (one row per batch entry) by up to
    /// `output_len` tokens. Rows that emitted `eos` keep emitting it; the
    /// generation stops early once every row has, or when the sequence
    /// reaches the engine's maximum length.
    pub fn generate(&mut self, prompt: &[Vec<u32>], output_len: usize, eos: u32) -> Result<Generation> {
        if prompt.len() != self.batch_size {
            return Err(Seq2SeqError::InvalidArgs(format!(
                "prompt has {} rows, session batch size is {}",
                prompt.len(),
                self.batch_size
            )));
        }
        let prompt_len = prompt.first().map(Vec::len).unwrap_or(0);
        if prompt_len == 0 || prompt.iter().any(|row| row.len() != prompt_len) {
            return Err(Seq2SeqError::InvalidArgs("prompt rows must be non-empty and of equal length".into()));
        }
        if prompt_len >= self.max_length {
            return Err(Seq2SeqError::InvalidArgs(format!(
                "prompt length {} leaves no room below the maximum length {}",
                prompt_len, self.max_length
            )));
        }

        let started = Instant::now();
        let mut rows: Vec<Vec<i32>> = prompt
            .iter()
            .map(|row| row.iter().map(|&t| t as i32).collect())
            .collect();
        let mut tokens = vec![Vec::with_capacity(output_len); self.batch_size];
        let mut finished = vec![false; self.batch_size];
        let mut step_ms = Vec::with_capacity(output_len);

        let mut len = prompt_len;
        while step_ms.len() < output_len && len < self.max_length {
            let ids: Vec<i32> = rows.iter().flatten().copied().collect();
            let (next, elapsed) = self.step(&ids, len)?;
            step_ms.push(elapsed);

            for (row, &token) in next.iter().enumerate() {
                let token = if finished[row] { eos } else { token };
                finished[row] |= token == eos;
                tokens[row].push(token);
                rows[row].push(token as i32);
            }
            len += 1;
            trace!(step = step_ms.len(), len, elapsed_ms = elapsed, "Decoder step");

            if finished.iter().all(|&f| f) {
                break;
            }
        }

        Ok(Generation {
            tokens,
            step_ms,
            total_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enginebench_runtime::{EngineBuilder, HostDevice, Runtime};

    fn decoder_engine(vocab: usize, max_batch: usize, max_len: usize) -> Engine {
        let blob = EngineBuilder::decoder("toy-decoder", vocab, max_batch, max_len, DType::F32)
            .and_then(|m| enginebench_runtime::format::encode(&m))
            .unwrap();
        Runtime::default().deserialize_engine(&blob).unwrap()
    }

    #[test]
    fn test_generate_lengths() {
        let device = HostDevice::new();
        let engine = decoder_engine(64, 2, 32);
        let mut session = DecoderSession::new(&device, &engine, 2).unwrap();

        // EOS outside the vocabulary never fires
        let prompt = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let generation = session.generate(&prompt, 5, 1000).unwrap();
        assert_eq!(generation.tokens.len(), 2);
        assert!(generation.tokens.iter().all(|row| row.len() == 5));
        assert_eq!(generation.step_ms.len(), 5);
        assert!(generation.tokens.iter().flatten().all(|&t| t < 64));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let device = HostDevice::new();
        let engine = decoder_engine(64, 1, 32);
        let mut session = DecoderSession::new(&device, &engine, 1).unwrap();

        let prompt = vec![vec![7, 8]];
        let a = session.generate(&prompt, 6, 1000).unwrap();
        let b = session.generate(&prompt, 6, 1000).unwrap();
        assert_eq!(a.tokens, b.tokens);
    }

    #[test]
    fn test_generate_stops_on_eos() {
        let device = HostDevice::new();
        let engine = decoder_engine(64, 1, 32);
        let mut session = DecoderSession::new(&device, &engine, 1).unwrap();

        let prompt = vec![vec![7, 8]];
        let free = session.generate(&prompt, 6, 1000).unwrap();
        let first = free.tokens[0][0];

        // Declaring the first generated token as EOS ends generation after one step
        let stopped = session.generate(&prompt, 6, first).unwrap();
        assert_eq!(stopped.tokens, vec![vec![first]]);
        assert_eq!(stopped.step_ms.len(), 1);
    }

    #[test]
    fn test_generate_capped_by_max_length() {
        let device = HostDevice::new();
        let engine = decoder_engine(16, 1, 6);
        let mut session = DecoderSession::new(&device, &engine, 1).unwrap();

        let generation = session.generate(&[vec![1, 2, 3, 4]], 10, 1000).unwrap();
        assert_eq!(generation.tokens[0].len(), 2);
    }

    #[test]
    fn test_prompt_validation() {
        let device = HostDevice::new();
        let engine = decoder_engine(16, 2, 6);
        let mut session = DecoderSession::new(&device, &engine, 2).unwrap();

        assert!(session.generate(&[vec![1]], 2, 0).is_err());
        assert!(session.generate(&[vec![1], vec![1, 2]], 2, 0).is_err());
        assert!(session.generate(&[vec![1; 6], vec![1; 6]], 2, 0).is_err());
    }

    #[test]
    fn test_empty_vocabulary_engine_never_reaches_a_session() {
        let mut manifest = EngineBuilder::decoder("toy-decoder", 16, 1, 8, DType::F32).unwrap();
        manifest.kind = EngineKind::Decoder { vocab_size: 0 };
        manifest.bindings[1].dims = vec![-1, 0];
        let blob = enginebench_runtime::format::encode(&manifest).unwrap();

        let err = Runtime::default().deserialize_engine(&blob).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidEngine(_)));
    }

    #[test]
    fn test_batch_above_profile_rejected() {
        let device = HostDevice::new();
        let engine = decoder_engine(16, 2, 8);
        assert!(matches!(
            DecoderSession::new(&device, &engine, 3),
            Err(Seq2SeqError::InvalidArgs(_))
        ));
    }

    #[test]
    fn test_buffers_released_on_drop() {
        let device = HostDevice::new();
        let engine = decoder_engine(16, 2, 8);
        {
            let _session = DecoderSession::new(&device, &engine, 2).unwrap();
            assert!(device.live_bytes() > 0);
        }
        assert_eq!(device.live_bytes(), 0);
    }
}
