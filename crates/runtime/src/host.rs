//! Host-memory device
//!
//! Streams execute work synchronously at dispatch time and events capture an
//! `Instant`, so elapsed time between two events brackets exactly the work
//! dispatched in between. The device keeps allocation accounting that tests
//! use to check buffers are released.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::device::{Device, DeviceMemory};
use crate::error::{Result, RuntimeError};

#[derive(Debug, Default)]
struct Accounting {
    live_bytes: AtomicUsize,
    allocations: AtomicUsize,
}

/// Device backed by host memory
#[derive(Debug, Clone, Default)]
pub struct HostDevice {
    accounting: Arc<Accounting>,
    memory_limit: Option<usize>,
}

impl HostDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail allocations that would push live memory above `bytes`
    pub fn with_memory_limit(bytes: usize) -> Self {
        Self {
            accounting: Arc::default(),
            memory_limit: Some(bytes),
        }
    }

    /// Bytes currently allocated and not yet released
    pub fn live_bytes(&self) -> usize {
        self.accounting.live_bytes.load(Ordering::SeqCst)
    }

    /// Number of successful allocations since creation
    pub fn allocation_count(&self) -> usize {
        self.accounting.allocations.load(Ordering::SeqCst)
    }
}

/// Host allocation; returns its bytes to the owning device's accounting on drop
#[derive(Debug)]
pub struct HostMemory {
    data: Vec<u8>,
    accounting: Arc<Accounting>,
}

impl HostMemory {
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl DeviceMemory for HostMemory {
    fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        self.accounting
            .live_bytes
            .fetch_sub(self.data.len(), Ordering::SeqCst);
    }
}

/// Host stream; work runs inline
#[derive(Debug, Default)]
pub struct HostStream {
    _private: (),
}

/// Host timing event
#[derive(Debug, Default)]
pub struct HostEvent {
    recorded: Option<Instant>,
}

impl Device for HostDevice {
    type Memory = HostMemory;
    type Stream = HostStream;
    type Event = HostEvent;

    fn name(&self) -> String {
        "host".to_string()
    }

    fn alloc(&self, bytes: usize) -> Result<HostMemory> {
        let live = self.live_bytes();
        if let Some(limit) = self.memory_limit {
            if live + bytes > limit {
                return Err(RuntimeError::OutOfMemory {
                    requested: bytes,
                    available: limit.saturating_sub(live),
                });
            }
        }
        self.accounting.live_bytes.fetch_add(bytes, Ordering::SeqCst);
        self.accounting.allocations.fetch_add(1, Ordering::SeqCst);
        Ok(HostMemory {
            data: vec![0u8; bytes],
            accounting: Arc::clone(&self.accounting),
        })
    }

    fn copy_htod(&self, src: &[u8], dst: &mut HostMemory) -> Result<()> {
        if src.len() > dst.data.len() {
            return Err(RuntimeError::Device(format!(
                "htod copy of {} bytes into {} byte allocation",
                src.len(),
                dst.data.len()
            )));
        }
        dst.data[..src.len()].copy_from_slice(src);
        Ok(())
    }

    fn copy_dtoh(&self, src: &HostMemory, dst: &mut [u8]) -> Result<()> {
        if dst.len() > src.data.len() {
            return Err(RuntimeError::Device(format!(
                "dtoh copy of {} bytes from {} byte allocation",
                dst.len(),
                src.data.len()
            )));
        }
        dst.copy_from_slice(&src.data[..dst.len()]);
        Ok(())
    }

    fn create_stream(&self) -> Result<HostStream> {
        Ok(HostStream::default())
    }

    fn synchronize(&self, _stream: &HostStream) -> Result<()> {
        Ok(())
    }

    fn create_event(&self) -> Result<HostEvent> {
        Ok(HostEvent::default())
    }

    fn record_event(&self, event: &mut HostEvent, _stream: &HostStream) -> Result<()> {
        event.recorded = Some(Instant::now());
        Ok(())
    }

    fn elapsed_ms(&self, start: &HostEvent, end: &HostEvent) -> Result<f32> {
        let start = start.recorded.ok_or(RuntimeError::EventNotRecorded("start"))?;
        let end = end.recorded.ok_or(RuntimeError::EventNotRecorded("end"))?;
        Ok(end.saturating_duration_since(start).as_secs_f32() * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceBuffer;
    use crate::tensor::DType;

    #[test]
    fn test_buffer_sizing_and_release() {
        let device = HostDevice::new();
        {
            let buffer = DeviceBuffer::new(&device, vec![128 * 4], DType::I32).unwrap();
            assert_eq!(buffer.size_bytes(), 2048);
            assert_eq!(device.live_bytes(), 2048);
        }
        assert_eq!(device.live_bytes(), 0);
        assert_eq!(device.allocation_count(), 1);
    }

    #[test]
    fn test_memory_limit() {
        let device = HostDevice::with_memory_limit(1024);
        let _a = device.alloc(1000).unwrap();
        let err = device.alloc(100).unwrap_err();
        assert!(err.is_resource_error());
        assert!(matches!(err, RuntimeError::OutOfMemory { requested: 100, available: 24 }));
    }

    #[test]
    fn test_upload_download() {
        let device = HostDevice::new();
        let mut buffer = DeviceBuffer::new(&device, vec![4], DType::I32).unwrap();
        buffer.upload(&device, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(buffer.download(&device, 8).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(buffer.upload(&device, &[0u8; 17]).is_err());
    }

    #[test]
    fn test_events() {
        let device = HostDevice::new();
        let stream = device.create_stream().unwrap();
        let mut start = device.create_event().unwrap();
        let mut end = device.create_event().unwrap();
        assert!(device.elapsed_ms(&start, &end).is_err());
        device.record_event(&mut start, &stream).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        device.record_event(&mut end, &stream).unwrap();
        assert!(device.elapsed_ms(&start, &end).unwrap() >= 2.0);
    }
}
