//! CUDA device using cudarc
//!
//! Memory lives in `CudaSlice<u8>` allocations. Each benchmark stream is forked
//! from the default stream, and timing uses driver events so the measured time
//! covers only work queued on the stream between the two records.

use std::sync::Arc;

use cudarc::driver::{result, sys, CudaDevice, CudaSlice, CudaStream};

use crate::device::{Device, DeviceMemory};
use crate::error::{Result, RuntimeError};

/// GPU device wrapper
#[derive(Clone)]
pub struct CudaGpu {
    device: Arc<CudaDevice>,
    pub device_id: usize,
}

impl CudaGpu {
    pub fn new(device_id: usize) -> Result<Self> {
        let device = CudaDevice::new(device_id).map_err(|e| {
            RuntimeError::Device(format!("Failed to create CUDA device {}: {:?}", device_id, e))
        })?;
        Ok(Self { device, device_id })
    }

    /// Get the underlying CudaDevice
    pub fn cuda_device(&self) -> &Arc<CudaDevice> {
        &self.device
    }

    /// Memory info (free, total) in bytes
    pub fn memory_info(&self) -> Result<(usize, usize)> {
        result::mem_get_info().map_err(|e| RuntimeError::Device(format!("mem_get_info failed: {:?}", e)))
    }
}

impl std::fmt::Debug for CudaGpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaGpu")
            .field("device_id", &self.device_id)
            .finish()
    }
}

impl DeviceMemory for CudaSlice<u8> {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

/// Driver event, destroyed on drop
pub struct CudaEvent {
    event: sys::CUevent,
    recorded: bool,
}

impl Drop for CudaEvent {
    fn drop(&mut self) {
        unsafe {
            let _ = result::event::destroy(self.event);
        }
    }
}

impl Device for CudaGpu {
    type Memory = CudaSlice<u8>;
    type Stream = CudaStream;
    type Event = CudaEvent;

    fn name(&self) -> String {
        format!("cuda:{}", self.device_id)
    }

    fn alloc(&self, bytes: usize) -> Result<CudaSlice<u8>> {
        self.device.alloc_zeros::<u8>(bytes).map_err(|e| {
            RuntimeError::Device(format!("Failed to allocate {} bytes of GPU memory: {:?}", bytes, e))
        })
    }

    fn copy_htod(&self, src: &[u8], dst: &mut CudaSlice<u8>) -> Result<()> {
        if src.len() > dst.len() {
            return Err(RuntimeError::Device(format!(
                "htod copy of {} bytes into {} byte allocation",
                src.len(),
                dst.len()
            )));
        }
        let mut view = dst.slice_mut(0..src.len());
        self.device
            .htod_sync_copy_into(src, &mut view)
            .map_err(|e| RuntimeError::Device(format!("Failed to copy to GPU: {:?}", e)))
    }

    fn copy_dtoh(&self, src: &CudaSlice<u8>, dst: &mut [u8]) -> Result<()> {
        if dst.len() > src.len() {
            return Err(RuntimeError::Device(format!(
                "dtoh copy of {} bytes from {} byte allocation",
                dst.len(),
                src.len()
            )));
        }
        let view = src.slice(0..dst.len());
        self.device
            .dtoh_sync_copy_into(&view, dst)
            .map_err(|e| RuntimeError::Device(format!("Failed to copy from GPU: {:?}", e)))
    }

    fn create_stream(&self) -> Result<CudaStream> {
        self.device
            .fork_default_stream()
            .map_err(|e| RuntimeError::Device(format!("Failed to create stream: {:?}", e)))
    }

    fn synchronize(&self, stream: &CudaStream) -> Result<()> {
        unsafe { result::stream::synchronize(stream.stream) }
            .map_err(|e| RuntimeError::Device(format!("Failed to synchronize stream: {:?}", e)))
    }

    fn create_event(&self) -> Result<CudaEvent> {
        self.device
            .bind_to_thread()
            .map_err(|e| RuntimeError::Device(format!("Failed to bind device to thread: {:?}", e)))?;
        let event = result::event::create(sys::CUevent_flags::CU_EVENT_DEFAULT)
            .map_err(|e| RuntimeError::Device(format!("Failed to create event: {:?}", e)))?;
        Ok(CudaEvent {
            event,
            recorded: false,
        })
    }

    fn record_event(&self, event: &mut CudaEvent, stream: &CudaStream) -> Result<()> {
        unsafe { result::event::record(event.event, stream.stream) }
            .map_err(|e| RuntimeError::Device(format!("Failed to record event: {:?}", e)))?;
        event.recorded = true;
        Ok(())
    }

    fn elapsed_ms(&self, start: &CudaEvent, end: &CudaEvent) -> Result<f32> {
        if !start.recorded {
            return Err(RuntimeError::EventNotRecorded("start"));
        }
        if !end.recorded {
            return Err(RuntimeError::EventNotRecorded("end"));
        }
        unsafe { result::event::elapsed(start.event, end.event) }
            .map_err(|e| RuntimeError::Device(format!("Failed to read event timing: {:?}", e)))
    }
}
