// Design constants for the GPU -> collider sync cycle.
// Distances are in mesh-local units, time in seconds.

/// Delay between allocating the displacement buffer and the first readback.
/// Gives the GPU stage a chance to produce a frame before we trust its contents.
pub const SETTLE_DELAY_SECS: f32 = 0.25;

/// X correction between the GPU displacement frame and the CPU mesh frame
pub const BIAS_X: f32 = 0.01;

/// Y correction between the GPU displacement frame and the CPU mesh frame
pub const BIAS_Y: f32 = 0.02;

/// Vertices per unit of parallel work in the applier
pub const BATCH_SIZE: usize = 64;

/// Shader-visible name of the displacement buffer
pub const BUFFER_BINDING_NAME: &str = "_VertexPositionsBuffer";

/// Random-write slot the GPU stage writes the displacement buffer through
pub const BUFFER_BINDING_SLOT: u32 = 1;

/// Host fixed-tick rate (Hz)
pub const FIXED_TICK_HZ: f64 = 50.0;

/// Name given to the republished collision mesh
pub const RUNTIME_MESH_NAME: &str = "RuntimeMesh";

/// Workgroup size for the demo displacement compute shader
pub const WORKGROUP_SIZE: u32 = 64;
