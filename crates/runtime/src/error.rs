//! Runtime error types

use thiserror::Error;

/// Runtime result type
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Runtime error types
#[derive(Debug, Error)]
pub enum RuntimeError {
    // Engine format errors
    #[error("Invalid engine: {0}")]
    InvalidEngine(String),

    #[error("Engine data too short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("Unsupported engine format version: {0}")]
    UnsupportedVersion(u16),

    #[error("Engine checksum mismatch: expected {expected:#010x}, got {got:#010x}")]
    ChecksumMismatch { expected: u32, got: u32 },

    // Binding and shape errors
    #[error("Unknown binding: {0}")]
    UnknownBinding(String),

    #[error("Binding {0} is not an input")]
    NotAnInput(String),

    #[error("Rank mismatch for binding {name}: expected {expected}, got {got}")]
    RankMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Shape {shape:?} for binding {name} is outside profile {profile} range [{min:?}, {max:?}]")]
    ShapeOutOfRange {
        name: String,
        shape: Vec<usize>,
        profile: usize,
        min: Vec<usize>,
        max: Vec<usize>,
    },

    #[error("Optimization profile {index} out of range (engine has {count})")]
    ProfileOutOfRange { index: usize, count: usize },

    #[error("Unresolved shapes for bindings: {0:?}")]
    UnresolvedShapes(Vec<String>),

    #[error("Expected {expected} bindings, got {got}")]
    BindingCountMismatch { expected: usize, got: usize },

    #[error("Device buffer for {name} too small: need {need} bytes, have {have}")]
    BufferTooSmall {
        name: String,
        need: usize,
        have: usize,
    },

    // Device errors
    #[error("Device error: {0}")]
    Device(String),

    #[error("Out of device memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    #[error("Event {0} has not been recorded")]
    EventNotRecorded(&'static str),

    // Configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Whether this error reports an exhausted or failing device
    pub fn is_resource_error(&self) -> bool {
        matches!(self, RuntimeError::Device(_) | RuntimeError::OutOfMemory { .. })
    }
}
