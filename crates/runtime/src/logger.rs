//! Runtime logger configuration
//!
//! The runtime does not own a process-wide logger. Callers hand a
//! [`LoggerConfig`] to [`crate::Runtime::new`], and every engine and context
//! created from that runtime filters its messages through it before they reach
//! `tracing`.

use serde::{Deserialize, Serialize};

/// Message severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    InternalError,
    Error,
    Warning,
    Info,
    Verbose,
}

impl Severity {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "internal_error" | "internal" => Some(Self::InternalError),
            "error" => Some(Self::Error),
            "warning" | "warn" => Some(Self::Warning),
            "info" => Some(Self::Info),
            "verbose" | "debug" => Some(Self::Verbose),
            _ => None,
        }
    }
}

/// Severity filter for runtime messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Messages less severe than this are dropped
    pub min_severity: Severity,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_severity: Severity::Warning,
        }
    }
}

impl LoggerConfig {
    pub fn new(min_severity: Severity) -> Self {
        Self { min_severity }
    }

    /// Whether a message of this severity passes the filter
    pub fn enabled(&self, severity: Severity) -> bool {
        severity <= self.min_severity
    }

    pub fn log(&self, severity: Severity, message: &str) {
        if !self.enabled(severity) {
            return;
        }
        match severity {
            Severity::InternalError | Severity::Error => tracing::error!(target: "enginebench_runtime", "{}", message),
            Severity::Warning => tracing::warn!(target: "enginebench_runtime", "{}", message),
            Severity::Info => tracing::info!(target: "enginebench_runtime", "{}", message),
            Severity::Verbose => tracing::debug!(target: "enginebench_runtime", "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_filter() {
        let logger = LoggerConfig::new(Severity::Error);
        assert!(logger.enabled(Severity::InternalError));
        assert!(logger.enabled(Severity::Error));
        assert!(!logger.enabled(Severity::Warning));
        assert!(!logger.enabled(Severity::Verbose));
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::from_str("WARN"), Some(Severity::Warning));
        assert_eq!(Severity::from_str("verbose"), Some(Severity::Verbose));
        assert_eq!(Severity::from_str("loud"), None);
    }
}
