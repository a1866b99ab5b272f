use meshsync_core::{BufferBinding, Float3, SyncError};

/// Shape of the displacement buffer: one packed [`Float3`] per vertex
#[derive(Debug, Clone, PartialEq)]
pub struct BufferLayout {
    pub vertex_count: usize,
    pub stride: usize,
    pub binding: BufferBinding,
}

impl BufferLayout {
    pub fn new(vertex_count: usize, binding: BufferBinding) -> Self {
        Self {
            vertex_count,
            stride: std::mem::size_of::<Float3>(),
            binding,
        }
    }

    pub fn byte_size(&self) -> u64 {
        (self.vertex_count * self.stride) as u64
    }
}

/// Storage that the GPU stage writes and the CPU reads back.
///
/// Implementations do not interpret the contents: whatever was last written
/// (zeros before the first GPU write) is handed back unchanged.
pub trait DisplacementBackend: Send + Sync {
    /// Allocate the buffer and bind it where the GPU stage can find it
    fn allocate(&mut self, layout: &BufferLayout) -> Result<(), SyncError>;

    /// Blocking copy of the current buffer contents into `dst`.
    /// `dst.len()` always equals the allocated vertex count.
    fn read(&mut self, dst: &mut [Float3]) -> Result<(), SyncError>;

    /// Drop the buffer and unbind it. Must be a no-op when nothing is allocated.
    fn release(&mut self);

    fn is_bound(&self) -> bool;
}

impl<B: DisplacementBackend + ?Sized> DisplacementBackend for Box<B> {
    fn allocate(&mut self, layout: &BufferLayout) -> Result<(), SyncError> {
        (**self).allocate(layout)
    }

    fn read(&mut self, dst: &mut [Float3]) -> Result<(), SyncError> {
        (**self).read(dst)
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn is_bound(&self) -> bool {
        (**self).is_bound()
    }
}
