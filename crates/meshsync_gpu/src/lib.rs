pub mod backend;
pub mod buffers;
pub mod channel;
pub mod host;
pub mod stage;

pub use backend::{BufferLayout, DisplacementBackend};
pub use buffers::{DisplacementBindings, ReadbackBuffer, RenderBackend};
pub use channel::DisplacementChannel;
pub use host::{HostBackend, HostGpuBuffer};
pub use stage::{RippleParams, RippleStage};
