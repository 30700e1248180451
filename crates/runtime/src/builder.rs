//! Engine builder
//!
//! Produces validated [`EngineManifest`]s. The BERT and decoder helpers lay
//! out bindings and profiles the way the benchmark and seq2seq tools expect.

use crate::engine::{BindingDesc, EngineKind, EngineManifest, OptimizationProfile, ShapeRange};
use crate::error::{Result, RuntimeError};
use crate::format;
use crate::tensor::{DType, DYNAMIC_DIM};

/// Input bindings of a variable sequence length BERT engine, in binding order
pub const BERT_INPUT_BINDINGS: [&str; 4] = ["input_ids", "segment_ids", "cu_seqlens", "max_seqlen"];

/// Output binding of a variable sequence length BERT engine
pub const BERT_OUTPUT_BINDING: &str = "cls_squad_logits";

/// Decoder input binding
pub const DECODER_INPUT_BINDING: &str = "input_ids";

/// Decoder output binding
pub const DECODER_OUTPUT_BINDING: &str = "logits";

/// Fluent engine builder
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    name: String,
    kind: EngineKind,
    bindings: Vec<BindingDesc>,
    profiles: Vec<OptimizationProfile>,
}

impl EngineBuilder {
    pub fn new(name: impl Into<String>, kind: EngineKind) -> Self {
        Self {
            name: name.into(),
            kind,
            bindings: Vec::new(),
            profiles: Vec::new(),
        }
    }

    pub fn input(mut self, name: &str, dtype: DType, dims: Vec<i64>) -> Self {
        self.bindings.push(BindingDesc {
            name: name.to_string(),
            dtype,
            dims,
            is_input: true,
        });
        self
    }

    pub fn output(mut self, name: &str, dtype: DType, dims: Vec<i64>) -> Self {
        self.bindings.push(BindingDesc {
            name: name.to_string(),
            dtype,
            dims,
            is_input: false,
        });
        self
    }

    pub fn profile(mut self, profile: OptimizationProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// Validate and produce the manifest; see [`EngineManifest::validate`]
    pub fn build(self) -> Result<EngineManifest> {
        let manifest = EngineManifest {
            name: self.name,
            kind: self.kind,
            bindings: self.bindings,
            profiles: self.profiles,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate and serialize into an engine blob
    pub fn serialize(self) -> Result<Vec<u8>> {
        format::encode(&self.build()?)
    }

    /// Variable sequence length BERT engine with one profile per batch size.
    ///
    /// Batch sizes are sorted and deduplicated, so profile `i` serves the
    /// `i`-th smallest batch size and accepts any batch up to it.
    pub fn bert_varseqlen(sequence_length: usize, batch_sizes: &[usize], output_dtype: DType) -> Result<EngineManifest> {
        if sequence_length == 0 {
            return Err(RuntimeError::InvalidConfig("sequence length must be positive".into()));
        }
        let mut sizes = batch_sizes.to_vec();
        sizes.sort_unstable();
        sizes.dedup();
        if sizes.is_empty() || sizes[0] == 0 {
            return Err(RuntimeError::InvalidConfig("batch sizes must be positive".into()));
        }

        let mut builder = EngineBuilder::new(format!("bert-varseqlen-s{}", sequence_length), EngineKind::BertVarSeqLen);
        for name in BERT_INPUT_BINDINGS {
            builder = builder.input(name, DType::I32, vec![DYNAMIC_DIM]);
        }
        builder = builder.output(BERT_OUTPUT_BINDING, output_dtype, vec![DYNAMIC_DIM, 2, 1, 1]);

        for &bs in &sizes {
            let tokens = sequence_length * bs;
            let mut profile = OptimizationProfile::default();
            profile
                .shapes
                .insert("input_ids".into(), ShapeRange::new(vec![1], vec![tokens], vec![tokens]));
            profile
                .shapes
                .insert("segment_ids".into(), ShapeRange::new(vec![1], vec![tokens], vec![tokens]));
            profile
                .shapes
                .insert("cu_seqlens".into(), ShapeRange::new(vec![2], vec![bs + 1], vec![bs + 1]));
            profile.shapes.insert(
                "max_seqlen".into(),
                ShapeRange::new(vec![1], vec![sequence_length], vec![sequence_length]),
            );
            builder = builder.profile(profile);
        }
        builder.build()
    }

    /// Decoder engine with a single profile up to `max_batch x max_length`
    pub fn decoder(
        name: &str,
        vocab_size: usize,
        max_batch: usize,
        max_length: usize,
        output_dtype: DType,
    ) -> Result<EngineManifest> {
        if vocab_size == 0 || max_batch == 0 || max_length == 0 {
            return Err(RuntimeError::InvalidConfig(
                "decoder vocab size, batch and length must be positive".into(),
            ));
        }
        let mut profile = OptimizationProfile::default();
        profile.shapes.insert(
            DECODER_INPUT_BINDING.into(),
            ShapeRange::new(vec![1, 1], vec![max_batch, max_length], vec![max_batch, max_length]),
        );
        EngineBuilder::new(name, EngineKind::Decoder { vocab_size })
            .input(DECODER_INPUT_BINDING, DType::I32, vec![DYNAMIC_DIM, DYNAMIC_DIM])
            .output(DECODER_OUTPUT_BINDING, output_dtype, vec![DYNAMIC_DIM, vocab_size as i64])
            .profile(profile)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bert_profiles_sorted() {
        let manifest = EngineBuilder::bert_varseqlen(128, &[4, 1, 2, 2], DType::F16).unwrap();
        assert_eq!(manifest.profiles.len(), 3);
        let maxes: Vec<usize> = manifest
            .profiles
            .iter()
            .map(|p| p.shapes["cu_seqlens"].max[0] - 1)
            .collect();
        assert_eq!(maxes, vec![1, 2, 4]);
        assert_eq!(manifest.bindings.len(), 5);
        assert_eq!(manifest.bindings[4].name, BERT_OUTPUT_BINDING);
    }

    #[test]
    fn test_bert_rejects_zero_batch() {
        assert!(EngineBuilder::bert_varseqlen(128, &[0, 1], DType::F32).is_err());
        assert!(EngineBuilder::bert_varseqlen(128, &[], DType::F32).is_err());
        assert!(EngineBuilder::bert_varseqlen(0, &[1], DType::F32).is_err());
    }

    #[test]
    fn test_profile_must_cover_inputs() {
        let err = EngineBuilder::new("partial", EngineKind::BertVarSeqLen)
            .input("input_ids", DType::I32, vec![DYNAMIC_DIM])
            .input("segment_ids", DType::I32, vec![DYNAMIC_DIM])
            .profile({
                let mut p = OptimizationProfile::default();
                p.shapes
                    .insert("input_ids".into(), ShapeRange::new(vec![1], vec![8], vec![8]));
                p
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("segment_ids"));
    }

    #[test]
    fn test_fixed_dimension_pinned() {
        let mut profile = OptimizationProfile::default();
        profile
            .shapes
            .insert("x".into(), ShapeRange::new(vec![1, 3], vec![2, 4], vec![4, 4]));
        let err = EngineBuilder::new("fixed", EngineKind::Decoder { vocab_size: 4 })
            .input("x", DType::I32, vec![DYNAMIC_DIM, 4])
            .profile(profile)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("fixed dimension 1"));
    }

    #[test]
    fn test_decoder_layout() {
        let manifest = EngineBuilder::decoder("gpt2-decoder", 50257, 4, 1024, DType::F32).unwrap();
        assert_eq!(manifest.kind, EngineKind::Decoder { vocab_size: 50257 });
        assert_eq!(manifest.bindings[1].dims, vec![DYNAMIC_DIM, 50257]);
        assert_eq!(manifest.profiles[0].shapes[DECODER_INPUT_BINDING].max, vec![4, 1024]);
    }
}
