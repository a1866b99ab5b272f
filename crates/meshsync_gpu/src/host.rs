use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use meshsync_core::{BufferBinding, Float3, SyncError};

use crate::backend::{BufferLayout, DisplacementBackend};

#[derive(Default)]
struct HostState {
    data: Option<Vec<Float3>>,
    binding: Option<BufferBinding>,
    allocations: u32,
    reject: Option<String>,
}

/// Host-memory stand-in for a GPU buffer.
///
/// Clones share the same storage, so one handle can play the GPU stage
/// (`write`) while a [`HostBackend`] built from another is read by a channel.
#[derive(Clone, Default)]
pub struct HostGpuBuffer {
    inner: Arc<Mutex<HostState>>,
}

impl HostGpuBuffer {
    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn backend(&self) -> HostBackend {
        HostBackend {
            buffer: self.clone(),
        }
    }

    /// Overwrite the whole buffer, as a GPU dispatch would.
    /// Returns false, writing nothing, when unallocated or `values` is the wrong length.
    pub fn write(&self, values: &[Float3]) -> bool {
        let mut state = self.lock();
        match state.data.as_mut() {
            Some(data) if data.len() == values.len() => {
                data.copy_from_slice(values);
                true
            }
            _ => false,
        }
    }

    pub fn write_vertex(&self, index: usize, value: Float3) -> bool {
        let mut state = self.lock();
        match state.data.as_mut().and_then(|d| d.get_mut(index)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Make every following allocation fail with `reason`
    pub fn reject_allocations(&self, reason: &str) {
        self.lock().reject = Some(reason.to_string());
    }

    pub fn is_bound(&self) -> bool {
        self.lock().binding.is_some()
    }

    pub fn binding(&self) -> Option<BufferBinding> {
        self.lock().binding.clone()
    }

    pub fn len(&self) -> Option<usize> {
        self.lock().data.as_ref().map(Vec::len)
    }

    pub fn allocation_count(&self) -> u32 {
        self.lock().allocations
    }
}

/// [`DisplacementBackend`] over a [`HostGpuBuffer`]
pub struct HostBackend {
    buffer: HostGpuBuffer,
}

impl DisplacementBackend for HostBackend {
    fn allocate(&mut self, layout: &BufferLayout) -> Result<(), SyncError> {
        let mut state = self.buffer.lock();
        if let Some(reason) = &state.reject {
            return Err(SyncError::AllocationRejected(reason.clone()));
        }
        state.data = Some(vec![Float3::ZERO; layout.vertex_count]);
        state.binding = Some(layout.binding.clone());
        state.allocations += 1;
        Ok(())
    }

    fn read(&mut self, dst: &mut [Float3]) -> Result<(), SyncError> {
        let state = self.buffer.lock();
        let data = state.data.as_ref().ok_or(SyncError::NotInitialized)?;
        if data.len() != dst.len() {
            return Err(SyncError::LengthMismatch {
                what: "host buffer",
                expected: data.len(),
                actual: dst.len(),
            });
        }
        dst.copy_from_slice(data);
        Ok(())
    }

    fn release(&mut self) {
        let mut state = self.buffer.lock();
        state.data = None;
        state.binding = None;
    }

    fn is_bound(&self) -> bool {
        self.buffer.is_bound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_requires_allocation() {
        let gpu = HostGpuBuffer::default();
        assert!(!gpu.write(&[Float3::ZERO]));
        assert!(!gpu.write_vertex(0, Float3::ZERO));

        let mut backend = gpu.backend();
        backend
            .allocate(&BufferLayout::new(2, BufferBinding::default()))
            .unwrap();
        assert!(gpu.write_vertex(1, Float3::new(1.0, 1.0, 1.0)));
        assert!(!gpu.write_vertex(2, Float3::ZERO));

        let mut dst = [Float3::ZERO; 2];
        backend.read(&mut dst).unwrap();
        assert_eq!(dst[1], Float3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_write_rejects_wrong_length() {
        let gpu = HostGpuBuffer::default();
        let mut backend = gpu.backend();
        backend
            .allocate(&BufferLayout::new(3, BufferBinding::default()))
            .unwrap();

        let one = Float3::new(1.0, 1.0, 1.0);
        assert!(!gpu.write(&[one; 2]));
        assert!(!gpu.write(&[one; 4]));
        let mut dst = [one; 3];
        backend.read(&mut dst).unwrap();
        assert_eq!(dst, [Float3::ZERO; 3]);

        assert!(gpu.write(&[one; 3]));
        backend.read(&mut dst).unwrap();
        assert_eq!(dst, [one; 3]);
    }

    #[test]
    fn test_release_without_allocation() {
        let gpu = HostGpuBuffer::default();
        let mut backend = gpu.backend();
        backend.release();
        backend.release();
        assert!(!backend.is_bound());
        assert_eq!(gpu.len(), None);
    }
}
