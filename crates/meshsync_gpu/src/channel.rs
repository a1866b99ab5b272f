use bevy::log::{debug, info};
use meshsync_core::{BufferBinding, Float3, SyncError};

use crate::backend::{BufferLayout, DisplacementBackend};

/// GPU-written, CPU-readable buffer of per-vertex positions.
///
/// Wraps a backend and enforces the channel contract: positive vertex count,
/// exact-length readback destinations, idempotent release.
pub struct DisplacementChannel<B: DisplacementBackend = Box<dyn DisplacementBackend>> {
    backend: B,
    binding: BufferBinding,
    layout: Option<BufferLayout>,
}

impl<B: DisplacementBackend> DisplacementChannel<B> {
    pub fn new(backend: B, binding: BufferBinding) -> Self {
        Self {
            backend,
            binding,
            layout: None,
        }
    }

    pub fn initialize(&mut self, vertex_count: usize) -> Result<(), SyncError> {
        if self.layout.is_some() {
            return Err(SyncError::InvalidState {
                operation: "initialize the displacement channel",
                state: "it is already initialized",
            });
        }
        if vertex_count == 0 {
            return Err(SyncError::ZeroVertexCount);
        }

        let layout = BufferLayout::new(vertex_count, self.binding.clone());
        if let Err(e) = self.backend.allocate(&layout) {
            // Leave nothing bound behind a failed setup
            self.backend.release();
            return Err(e);
        }

        info!(
            "Displacement channel: {} vertices ({} bytes) bound as `{}` (slot {})",
            vertex_count,
            layout.byte_size(),
            layout.binding.name,
            layout.binding.slot
        );
        self.layout = Some(layout);
        Ok(())
    }

    /// Blocks until the GPU buffer's current contents are copied into `dst`
    pub fn read_into(&mut self, dst: &mut [Float3]) -> Result<(), SyncError> {
        let layout = self.layout.as_ref().ok_or(SyncError::NotInitialized)?;
        if dst.len() != layout.vertex_count {
            return Err(SyncError::LengthMismatch {
                what: "readback destination",
                expected: layout.vertex_count,
                actual: dst.len(),
            });
        }
        self.backend.read(dst)?;
        debug!("Displacement channel: read back {} vertices", dst.len());
        Ok(())
    }

    pub fn release(&mut self) {
        let was_initialized = self.layout.take().is_some();
        self.backend.release();
        if was_initialized {
            info!("Displacement channel: released `{}`", self.binding.name);
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.layout.is_some()
    }

    pub fn is_bound(&self) -> bool {
        self.backend.is_bound()
    }

    pub fn vertex_count(&self) -> Option<usize> {
        self.layout.as_ref().map(|l| l.vertex_count)
    }

    /// Bytes per vertex element
    pub fn stride(&self) -> usize {
        std::mem::size_of::<Float3>()
    }

    pub fn byte_size(&self) -> u64 {
        self.layout.as_ref().map_or(0, |l| l.byte_size())
    }

    pub fn binding(&self) -> &BufferBinding {
        &self.binding
    }
}

impl<B: DisplacementBackend> Drop for DisplacementChannel<B> {
    fn drop(&mut self) {
        self.release();
    }
}
