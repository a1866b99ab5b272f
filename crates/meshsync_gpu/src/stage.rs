use bevy::render::render_resource::*;
use bevy::render::renderer::{RenderDevice, RenderQueue};
use meshsync_core::constants::WORKGROUP_SIZE;
use meshsync_core::Float3;

use crate::buffers::DisplacementBindings;

/// Ripple parameters sent to the GPU as a uniform buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RippleParams {
    pub time: f32,
    pub amplitude: f32,
    pub frequency: f32,
    pub speed: f32,
    pub frame_offset_x: f32,
    pub frame_offset_y: f32,
    pub vertex_count: u32,
    pub _pad: f32,
}

impl RippleParams {
    pub fn new(vertex_count: u32, frame_offset: [f32; 2]) -> Self {
        Self {
            time: 0.0,
            amplitude: 0.15,
            frequency: 6.0,
            speed: 2.5,
            frame_offset_x: frame_offset[0],
            frame_offset_y: frame_offset[1],
            vertex_count,
            _pad: 0.0,
        }
    }
}

/// Demo GPU stage: a compute pass that writes rippled positions into
/// whatever buffer is bound under `binding_name`.
pub struct RippleStage {
    pub pipeline: ComputePipeline,
    pub bind_group_layout: BindGroupLayout,
    pub rest_buffer: Buffer,
    pub params_buffer: Buffer,
    pub binding_name: String,
    pub vertex_count: u32,
    bind_group: Option<(BufferId, BindGroup)>,
}

impl RippleStage {
    pub fn new(
        device: &RenderDevice,
        rest_positions: &[Float3],
        params: &RippleParams,
        binding_name: &str,
    ) -> Self {
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("ripple_shader"),
            source: ShaderSource::Wgsl(include_str!("shaders/ripple.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(
            Some("ripple_bind_group_layout"),
            &[
                compute_buffer_entry(0, BufferBindingType::Storage { read_only: true }),
                compute_buffer_entry(1, BufferBindingType::Storage { read_only: false }),
                compute_buffer_entry(2, BufferBindingType::Uniform),
            ],
        );

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("ripple_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&RawComputePipelineDescriptor {
            label: Some("ripple_compute_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let rest_buffer = device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("ripple_rest_positions"),
            contents: bytemuck::cast_slice(rest_positions),
            usage: BufferUsages::STORAGE,
        });

        let params_buffer = device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("ripple_params"),
            contents: bytemuck::bytes_of(params),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        Self {
            pipeline,
            bind_group_layout,
            rest_buffer,
            params_buffer,
            binding_name: binding_name.to_string(),
            vertex_count: rest_positions.len() as u32,
            bind_group: None,
        }
    }

    /// Dispatch one ripple pass. Returns false while no displacement buffer is bound.
    pub fn dispatch(
        &mut self,
        device: &RenderDevice,
        queue: &RenderQueue,
        bindings: &DisplacementBindings,
        params: &RippleParams,
    ) -> bool {
        let Some((_, target)) = bindings.get(&self.binding_name) else {
            self.bind_group = None;
            return false;
        };

        // Rebuild when the channel reallocated its buffer
        let stale = self
            .bind_group
            .as_ref()
            .is_none_or(|(id, _)| *id != target.id());
        if stale {
            let bind_group = device.create_bind_group(
                Some("ripple_bind_group"),
                &self.bind_group_layout,
                &[
                    BindGroupEntry {
                        binding: 0,
                        resource: self.rest_buffer.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: target.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 2,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                ],
            );
            self.bind_group = Some((target.id(), bind_group));
        }
        let Some((_, bind_group)) = self.bind_group.as_ref() else {
            return false;
        };

        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));

        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("ripple_compute_encoder"),
        });

        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("ripple_compute_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            let workgroups = self.vertex_count.div_ceil(WORKGROUP_SIZE);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }

        queue.submit(std::iter::once(encoder.finish()));
        true
    }
}

fn compute_buffer_entry(binding: u32, ty: BufferBindingType) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
