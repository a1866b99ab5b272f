use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::constants::{BUFFER_BINDING_NAME, BUFFER_BINDING_SLOT};

/// GPU-packed vertex position: three tightly packed f32 components.
/// Must be repr(C) and Pod so a readback slice can be cast directly.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Float3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Float3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Float3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Float3> for [f32; 3] {
    fn from(v: Float3) -> Self {
        v.to_array()
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Float3,
    pub max: Float3,
}

impl Bounds {
    /// Smallest box containing every point, or None for an empty set
    pub fn from_points(points: &[Float3]) -> Option<Self> {
        let first = *points.first()?;
        let mut min = first;
        let mut max = first;
        for p in &points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        Some(Self { min, max })
    }
}

/// Shader-visible binding the GPU stage writes displacements through
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferBinding {
    pub name: String,
    pub slot: u32,
}

impl Default for BufferBinding {
    fn default() -> Self {
        Self {
            name: BUFFER_BINDING_NAME.to_string(),
            slot: BUFFER_BINDING_SLOT,
        }
    }
}
