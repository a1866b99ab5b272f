use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bevy::log::info;
use bevy::prelude::Resource;
use bevy::render::render_resource::*;
use bevy::render::renderer::{RenderDevice, RenderQueue};
use meshsync_core::{BufferBinding, Float3, SyncError};

use crate::backend::{BufferLayout, DisplacementBackend};

/// Named buffers the GPU stage writes into.
/// Cloned into every world that needs to look a binding up.
#[derive(Resource, Clone, Default)]
pub struct DisplacementBindings {
    inner: Arc<Mutex<HashMap<String, (u32, Buffer)>>>,
}

impl DisplacementBindings {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, (u32, Buffer)>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn bind(&self, binding: &BufferBinding, buffer: Buffer) {
        self.lock().insert(binding.name.clone(), (binding.slot, buffer));
    }

    pub fn unbind(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }

    /// Buffer and slot currently bound under `name`
    pub fn get(&self, name: &str) -> Option<(u32, Buffer)> {
        self.lock().get(name).cloned()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }
}

/// Device-local storage buffer plus the staging buffer it is copied into for readback
pub struct ReadbackBuffer {
    pub storage: Buffer,
    pub staging: Buffer,
    pub size: u64,
}

impl ReadbackBuffer {
    pub fn new(device: &RenderDevice, layout: &BufferLayout) -> Self {
        let size = layout.byte_size();
        let storage = device.create_buffer(&BufferDescriptor {
            label: Some("displacement_storage"),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&BufferDescriptor {
            label: Some("displacement_staging"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            storage,
            staging,
            size,
        }
    }

    /// Copy storage -> staging, wait for the device, then copy staging -> `dst`
    pub fn read(
        &self,
        device: &RenderDevice,
        queue: &RenderQueue,
        dst: &mut [Float3],
    ) -> Result<(), SyncError> {
        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("displacement_readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.storage, 0, &self.staging, 0, self.size);
        queue.submit(std::iter::once(encoder.finish()));

        let slice = self.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        // Stall until the copy and the map have both completed
        device.poll(Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(SyncError::Readback(e.to_string())),
            Err(_) => return Err(SyncError::Readback("map callback was dropped".into())),
        }

        {
            let data = slice.get_mapped_range();
            let out: &mut [u8] = bytemuck::cast_slice_mut(dst);
            out.copy_from_slice(&data);
        }
        self.staging.unmap();
        Ok(())
    }
}

/// [`DisplacementBackend`] backed by the render device
pub struct RenderBackend {
    device: RenderDevice,
    queue: RenderQueue,
    bindings: DisplacementBindings,
    buffer: Option<(BufferBinding, ReadbackBuffer)>,
}

impl RenderBackend {
    pub fn new(device: RenderDevice, queue: RenderQueue, bindings: DisplacementBindings) -> Self {
        Self {
            device,
            queue,
            bindings,
            buffer: None,
        }
    }
}

impl DisplacementBackend for RenderBackend {
    fn allocate(&mut self, layout: &BufferLayout) -> Result<(), SyncError> {
        let limits = self.device.limits();
        let size = layout.byte_size();
        if size > limits.max_buffer_size
            || size > limits.max_storage_buffer_binding_size as u64
        {
            return Err(SyncError::AllocationRejected(format!(
                "{} bytes exceeds device limits (buffer {}, storage binding {})",
                size, limits.max_buffer_size, limits.max_storage_buffer_binding_size
            )));
        }

        let buffer = ReadbackBuffer::new(&self.device, layout);
        self.bindings.bind(&layout.binding, buffer.storage.clone());
        info!(
            "Render backend: allocated {} byte storage + staging for `{}`",
            size, layout.binding.name
        );
        self.buffer = Some((layout.binding.clone(), buffer));
        Ok(())
    }

    fn read(&mut self, dst: &mut [Float3]) -> Result<(), SyncError> {
        let (_, buffer) = self.buffer.as_ref().ok_or(SyncError::NotInitialized)?;
        let expected = (dst.len() * std::mem::size_of::<Float3>()) as u64;
        if expected != buffer.size {
            return Err(SyncError::LengthMismatch {
                what: "staging buffer bytes",
                expected: buffer.size as usize,
                actual: expected as usize,
            });
        }
        buffer.read(&self.device, &self.queue, dst)
    }

    fn release(&mut self) {
        if let Some((binding, buffer)) = self.buffer.take() {
            self.bindings.unbind(&binding.name);
            buffer.storage.destroy();
            buffer.staging.destroy();
        }
    }

    fn is_bound(&self) -> bool {
        self.buffer
            .as_ref()
            .is_some_and(|(binding, _)| self.bindings.is_bound(&binding.name))
    }
}
