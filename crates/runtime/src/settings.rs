//! Environment-driven runtime settings

use crate::device::Device;
use crate::error::{Result, RuntimeError};
use crate::host::HostDevice;
use crate::logger::{LoggerConfig, Severity};

/// Work that can run on any [`Device`]; see [`RuntimeSettings::dispatch`]
pub trait DeviceTask {
    type Output;

    fn run<D: Device>(self, device: &D) -> Self::Output;
}

/// Device backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceBackend {
    Host,
    Cuda,
}

impl DeviceBackend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "host" | "cpu" => Some(Self::Host),
            "cuda" | "gpu" => Some(Self::Cuda),
            _ => None,
        }
    }
}

/// Runtime settings shared by the command-line tools
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Device backend (ENGINEBENCH_DEVICE)
    pub backend: DeviceBackend,
    /// CUDA device ordinal (ENGINEBENCH_CUDA_DEVICE)
    pub cuda_device: usize,
    /// Runtime logger threshold (ENGINEBENCH_LOG_SEVERITY)
    pub log_severity: Severity,
}

impl RuntimeSettings {
    /// Load settings from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            backend: lookup("ENGINEBENCH_DEVICE")
                .and_then(|s| DeviceBackend::from_str(&s))
                .unwrap_or(DeviceBackend::Host),
            cuda_device: lookup("ENGINEBENCH_CUDA_DEVICE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            // Benchmarks keep the runtime quiet unless asked otherwise
            log_severity: lookup("ENGINEBENCH_LOG_SEVERITY")
                .and_then(|s| Severity::from_str(&s))
                .unwrap_or(Severity::Error),
        }
    }

    pub fn logger(&self) -> LoggerConfig {
        LoggerConfig::new(self.log_severity)
    }

    /// Open the configured device and run `task` on it
    pub fn dispatch<T: DeviceTask>(&self, task: T) -> Result<T::Output> {
        match self.backend {
            DeviceBackend::Host => Ok(task.run(&HostDevice::new())),
            #[cfg(feature = "cuda")]
            DeviceBackend::Cuda => {
                let gpu = crate::cuda::CudaGpu::new(self.cuda_device)?;
                Ok(task.run(&gpu))
            }
            #[cfg(not(feature = "cuda"))]
            DeviceBackend::Cuda => Err(RuntimeError::InvalidConfig(
                "CUDA device requested but enginebench was built without the cuda feature".into(),
            )),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = RuntimeSettings::from_lookup(|_| None);
        assert_eq!(settings.backend, DeviceBackend::Host);
        assert_eq!(settings.cuda_device, 0);
        assert_eq!(settings.log_severity, Severity::Error);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ENGINEBENCH_DEVICE", "gpu"),
            ("ENGINEBENCH_CUDA_DEVICE", "3"),
            ("ENGINEBENCH_LOG_SEVERITY", "info"),
        ]
        .into_iter()
        .collect();
        let settings = RuntimeSettings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(settings.backend, DeviceBackend::Cuda);
        assert_eq!(settings.cuda_device, 3);
        assert_eq!(settings.logger().min_severity, Severity::Info);
    }

    struct DeviceName;

    impl DeviceTask for DeviceName {
        type Output = String;

        fn run<D: Device>(self, device: &D) -> String {
            device.name()
        }
    }

    #[test]
    fn test_dispatch_host() {
        let settings = RuntimeSettings::from_lookup(|_| None);
        assert_eq!(settings.dispatch(DeviceName).unwrap(), "host");
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_dispatch_cuda_without_feature() {
        let settings = RuntimeSettings::from_lookup(|k| (k == "ENGINEBENCH_DEVICE").then(|| "cuda".to_string()));
        assert!(matches!(settings.dispatch(DeviceName), Err(RuntimeError::InvalidConfig(_))));
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let settings = RuntimeSettings::from_lookup(|k| match k {
            "ENGINEBENCH_DEVICE" => Some("tpu".into()),
            "ENGINEBENCH_CUDA_DEVICE" => Some("first".into()),
            _ => None,
        });
        assert_eq!(settings.backend, DeviceBackend::Host);
        assert_eq!(settings.cuda_device, 0);
    }
}
