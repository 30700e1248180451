//! Run results of a network entry point

use std::fmt;
use std::path::PathBuf;

use crate::config::Precision;

/// Latency of one measured stage at the reported percentile
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRuntime {
    pub name: String,
    pub runtime_ms: f64,
}

/// Everything one run of a network produced
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkResult {
    pub network: String,
    pub variant: String,
    pub precision: Precision,
    pub batch_size: usize,
    pub percentile: u8,
    pub input_tokens: Vec<Vec<u32>>,
    pub output_tokens: Vec<Vec<u32>>,
    /// Timed generations that contributed to `runtimes`
    pub iterations: usize,
    pub runtimes: Vec<NetworkRuntime>,
    pub engines: Vec<PathBuf>,
}

impl NetworkResult {
    pub fn runtime(&self, name: &str) -> Option<f64> {
        self.runtimes.iter().find(|r| r.name == name).map(|r| r.runtime_ms)
    }
}

impl fmt::Display for NetworkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NetworkResult(network={}, variant={}, precision={}, batch_size={}, iterations={}, p{} runtimes=[",
            self.network, self.variant, self.precision, self.batch_size, self.iterations, self.percentile
        )?;
        for (i, runtime) in self.runtimes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:.3} ms", runtime.name, runtime.runtime_ms)?;
        }
        write!(f, "], output_tokens={:?})", self.output_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let result = NetworkResult {
            network: "GPT2".into(),
            variant: "gpt2".into(),
            precision: Precision::Fp32,
            batch_size: 1,
            percentile: 50,
            input_tokens: vec![vec![1, 2]],
            output_tokens: vec![vec![3, 4]],
            iterations: 10,
            runtimes: vec![
                NetworkRuntime {
                    name: "decoder".into(),
                    runtime_ms: 0.5,
                },
                NetworkRuntime {
                    name: "full".into(),
                    runtime_ms: 12.25,
                },
            ],
            engines: vec![],
        };
        assert_eq!(
            result.to_string(),
            "NetworkResult(network=GPT2, variant=gpt2, precision=fp32, batch_size=1, iterations=10, \
             p50 runtimes=[decoder: 0.500 ms, full: 12.250 ms], output_tokens=[[3, 4]])"
        );
        assert_eq!(result.runtime("full"), Some(12.25));
        assert_eq!(result.runtime("encoder"), None);
    }
}
