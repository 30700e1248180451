//! Seeded synthetic inputs

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::{BenchError, Result};

/// BERT base vocabulary size
pub const PSEUDO_VOCAB_SIZE: i32 = 30522;

/// Number of token types (segments)
pub const PSEUDO_TYPE_VOCAB_SIZE: i32 = 2;

/// Packed inputs for the largest batch: `sequence_length * max_batch_size`
/// tokens split into equal-length sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticInputs {
    pub word_ids: Vec<i32>,
    pub segment_ids: Vec<i32>,
    /// `0, s, 2s, ..., max_batch_size * s`
    pub cu_seqlens: Vec<i32>,
}

impl SyntheticInputs {
    /// Same seed, same arrays. Fails when the offsets do not fit in `i32`.
    pub fn generate(sequence_length: usize, max_batch_size: usize, seed: u64) -> Result<Self> {
        let tokens = sequence_length
            .checked_mul(max_batch_size)
            .filter(|&t| i32::try_from(t).is_ok())
            .ok_or_else(|| {
                BenchError::InvalidConfig(format!(
                    "{} sequences of length {} exceed the i32 token offset range",
                    max_batch_size, sequence_length
                ))
            })?;
        let mut rng = ChaCha20Rng::seed_from_u64(seed);

        let word_ids = (0..tokens).map(|_| rng.gen_range(0..PSEUDO_VOCAB_SIZE)).collect();
        let segment_ids = (0..tokens).map(|_| rng.gen_range(0..PSEUDO_TYPE_VOCAB_SIZE)).collect();
        let cu_seqlens = (0..=max_batch_size)
            .map(|i| {
                i32::try_from(i * sequence_length)
                    .map_err(|_| BenchError::InvalidConfig(format!("sequence offset {} overflows i32", i)))
            })
            .collect::<Result<Vec<i32>>>()?;

        Ok(Self {
            word_ids,
            segment_ids,
            cu_seqlens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_for_seed() {
        let a = SyntheticInputs::generate(128, 4, 12345).unwrap();
        let b = SyntheticInputs::generate(128, 4, 12345).unwrap();
        assert_eq!(a, b);

        let c = SyntheticInputs::generate(128, 4, 54321).unwrap();
        assert_ne!(a.word_ids, c.word_ids);
    }

    #[test]
    fn test_value_ranges() {
        let inputs = SyntheticInputs::generate(64, 3, 7).unwrap();
        assert_eq!(inputs.word_ids.len(), 192);
        assert_eq!(inputs.segment_ids.len(), 192);
        assert!(inputs.word_ids.iter().all(|&w| (0..PSEUDO_VOCAB_SIZE).contains(&w)));
        assert!(inputs.segment_ids.iter().all(|&s| s == 0 || s == 1));
    }

    #[test]
    fn test_cu_seqlens() {
        let inputs = SyntheticInputs::generate(128, 3, 1).unwrap();
        assert_eq!(inputs.cu_seqlens, vec![0, 128, 256, 384]);
    }

    #[test]
    fn test_offsets_must_fit_i32() {
        let too_many = (i32::MAX as usize) / 128 + 1;
        assert!(matches!(
            SyntheticInputs::generate(128, too_many, 1),
            Err(BenchError::InvalidConfig(_))
        ));
        assert!(SyntheticInputs::generate(usize::MAX, 2, 1).is_err());
    }
}
