//! Device abstraction: memory, streams and timing events
//!
//! Memory is untyped bytes; [`DeviceBuffer`] attaches the shape and element
//! type the allocation was sized for. Releasing memory is tied to `Drop`, so a
//! buffer is freed on every exit path of the scope that owns it.

use crate::error::{Result, RuntimeError};
use crate::tensor::{volume, DType};

/// Device memory allocation
pub trait DeviceMemory {
    /// Allocation size in bytes
    fn size_bytes(&self) -> usize;
}

/// A device that can hold engine bindings and time work on a stream
pub trait Device {
    type Memory: DeviceMemory;
    type Stream;
    type Event;

    /// Human readable device name
    fn name(&self) -> String;

    /// Allocate `bytes` of zeroed device memory
    fn alloc(&self, bytes: usize) -> Result<Self::Memory>;

    /// Copy host bytes into the start of `dst`
    fn copy_htod(&self, src: &[u8], dst: &mut Self::Memory) -> Result<()>;

    /// Copy the start of `src` into host bytes
    fn copy_dtoh(&self, src: &Self::Memory, dst: &mut [u8]) -> Result<()>;

    fn create_stream(&self) -> Result<Self::Stream>;

    /// Block until all work queued on `stream` has finished
    fn synchronize(&self, stream: &Self::Stream) -> Result<()>;

    fn create_event(&self) -> Result<Self::Event>;

    /// Enqueue `event` on `stream`
    fn record_event(&self, event: &mut Self::Event, stream: &Self::Stream) -> Result<()>;

    /// Milliseconds between two recorded events
    fn elapsed_ms(&self, start: &Self::Event, end: &Self::Event) -> Result<f32>;
}

/// Device allocation sized for a shape and element type
#[derive(Debug)]
pub struct DeviceBuffer<M> {
    pub shape: Vec<usize>,
    pub dtype: DType,
    memory: M,
}

impl<M: DeviceMemory> DeviceBuffer<M> {
    /// Allocate `volume(shape) * dtype.size_bytes()` bytes on `device`
    pub fn new<D: Device<Memory = M>>(device: &D, shape: Vec<usize>, dtype: DType) -> Result<Self> {
        let bytes = volume(&shape) * dtype.size_bytes();
        let memory = device.alloc(bytes)?;
        Ok(Self { shape, dtype, memory })
    }

    pub fn size_bytes(&self) -> usize {
        self.memory.size_bytes()
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Upload host bytes into the start of this buffer
    pub fn upload<D: Device<Memory = M>>(&mut self, device: &D, data: &[u8]) -> Result<()> {
        if data.len() > self.size_bytes() {
            return Err(RuntimeError::Device(format!(
                "Upload of {} bytes exceeds buffer of {} bytes",
                data.len(),
                self.size_bytes()
            )));
        }
        device.copy_htod(data, &mut self.memory)
    }

    /// Download the first `len` bytes of this buffer
    pub fn download<D: Device<Memory = M>>(&self, device: &D, len: usize) -> Result<Vec<u8>> {
        if len > self.size_bytes() {
            return Err(RuntimeError::Device(format!(
                "Download of {} bytes exceeds buffer of {} bytes",
                len,
                self.size_bytes()
            )));
        }
        let mut out = vec![0u8; len];
        device.copy_dtoh(&self.memory, &mut out)?;
        Ok(out)
    }
}
