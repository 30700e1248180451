//! Element types and shape helpers

use serde::{Deserialize, Serialize};

/// Marker for a dimension resolved at execution time
pub const DYNAMIC_DIM: i64 = -1;

/// Binding element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    I32,
    F32,
    F16,
    I8,
}

impl DType {
    pub fn size_bytes(&self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F16 => 2,
            DType::I8 => 1,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "i32" | "int32" => Some(DType::I32),
            "f32" | "fp32" | "float32" => Some(DType::F32),
            "f16" | "fp16" | "float16" => Some(DType::F16),
            "i8" | "int8" => Some(DType::I8),
            _ => None,
        }
    }
}

/// Number of elements in a shape (1 for a scalar)
pub fn volume(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Whether a declared dimension list contains dynamic dimensions
pub fn is_dynamic(dims: &[i64]) -> bool {
    dims.iter().any(|&d| d == DYNAMIC_DIM)
}

/// Encode i32 values as little-endian bytes
pub fn i32_to_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode little-endian bytes into i32 values; trailing bytes are ignored
pub fn bytes_to_i32(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Decode output bytes of the given float dtype into f32 values
pub fn bytes_to_f32(bytes: &[u8], dtype: DType) -> Vec<f32> {
    match dtype {
        DType::F16 => bytes
            .chunks_exact(2)
            .map(|c| half::f16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
            .collect(),
        _ => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

/// Encode f32 values in the given float dtype
pub fn f32_to_bytes(values: &[f32], dtype: DType) -> Vec<u8> {
    match dtype {
        DType::F16 => values
            .iter()
            .flat_map(|&v| half::f16::from_f32(v).to_bits().to_le_bytes())
            .collect(),
        _ => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}
