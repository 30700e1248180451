//! Engine deserialization entry point

use std::path::Path;

use crate::engine::Engine;
use crate::error::{Result, RuntimeError};
use crate::format;
use crate::logger::{LoggerConfig, Severity};

/// Deserializes engines; every engine it produces logs through its logger
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    logger: LoggerConfig,
}

impl Runtime {
    pub fn new(logger: LoggerConfig) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &LoggerConfig {
        &self.logger
    }

    /// Deserialize an engine from a serialized blob
    pub fn deserialize_engine(&self, blob: &[u8]) -> Result<Engine> {
        let manifest = format::decode(blob).map_err(|e| {
            self.logger
                .log(Severity::Error, &format!("Engine deserialization failed: {}", e));
            e
        })?;
        self.logger.log(
            Severity::Info,
            &format!(
                "Loaded engine {} with {} bindings and {} optimization profiles",
                manifest.name,
                manifest.bindings.len(),
                manifest.profiles.len()
            ),
        );
        Ok(Engine::new(manifest, self.logger))
    }

    /// Read and deserialize an engine file
    pub fn load_engine_file(&self, path: impl AsRef<Path>) -> Result<Engine> {
        let path = path.as_ref();
        let blob = std::fs::read(path).map_err(|e| {
            RuntimeError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read engine {}: {}", path.display(), e),
            ))
        })?;
        self.deserialize_engine(&blob)
    }
}
