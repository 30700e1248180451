//! Reference computations executed by engines
//!
//! Cheap, deterministic stand-ins for the optimized networks. Outputs depend
//! only on the inputs, so tests can compare runs across devices and batches.

use crate::error::{Result, RuntimeError};

/// Start/end span logits for every packed token.
///
/// Sequence `s` covers tokens `cu_seqlens[s]..cu_seqlens[s + 1]`; logits depend
/// on the token id, its segment and its position inside the sequence. Returns
/// `2 * word_ids.len()` values laid out `[start, end]` per token. Tokens past
/// the last offset are left at zero.
pub fn bert_squad_logits(word_ids: &[i32], segment_ids: &[i32], cu_seqlens: &[i32]) -> Result<Vec<f32>> {
    if word_ids.len() != segment_ids.len() {
        return Err(RuntimeError::InvalidConfig(format!(
            "input_ids has {} tokens but segment_ids has {}",
            word_ids.len(),
            segment_ids.len()
        )));
    }
    if cu_seqlens.len() < 2 || cu_seqlens[0] != 0 {
        return Err(RuntimeError::InvalidConfig(
            "cu_seqlens must start at 0 and describe at least one sequence".into(),
        ));
    }

    let total = word_ids.len();
    let mut out = vec![0.0f32; total * 2];
    for window in cu_seqlens.windows(2) {
        let (begin, end) = (window[0], window[1]);
        if begin > end || end as usize > total {
            return Err(RuntimeError::InvalidConfig(format!(
                "cu_seqlens offsets {}..{} invalid for {} tokens",
                begin, end, total
            )));
        }
        for (pos, t) in (begin as usize..end as usize).enumerate() {
            let word = word_ids[t] as f32;
            let seg = segment_ids[t] as f32;
            let p = pos as f32;
            out[2 * t] = (word * 0.0137 + seg * 0.5 + p * 0.031).sin();
            out[2 * t + 1] = (word * 0.0071 - seg * 0.25 + p * 0.017).cos();
        }
    }
    Ok(out)
}

/// Next-token logits for the last position of each row of a `batch x len`
/// row-major id matrix. Returns `batch * vocab_size` values.
pub fn decoder_next_token_logits(input_ids: &[i32], batch: usize, len: usize, vocab_size: usize) -> Result<Vec<f32>> {
    if len == 0 || input_ids.len() < batch * len {
        return Err(RuntimeError::InvalidConfig(format!(
            "decoder input holds {} ids, need {}x{}",
            input_ids.len(),
            batch,
            len
        )));
    }

    let mut out = Vec::with_capacity(batch * vocab_size);
    for row in 0..batch {
        let last = input_ids[row * len + len - 1].max(0) as u64;
        let prev = if len > 1 {
            input_ids[row * len + len - 2].max(0) as u64
        } else {
            0
        };
        let pos = (len - 1) as u64;
        for v in 0..vocab_size as u64 {
            let mixed = (last * 31 + prev * 7 + v * 17 + pos * 13) % 9973;
            out.push((mixed as f32 * 0.01).sin());
        }
    }
    Ok(out)
}

/// Index of the largest value; ties resolve to the lowest index
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
