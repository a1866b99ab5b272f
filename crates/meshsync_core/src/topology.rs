use crate::error::SyncError;
use crate::types::{Bounds, Float3};

/// Read-only view of the mesh the displacement field deforms.
///
/// Every accessor hands back an owned copy, so a snapshot never aliases the
/// source asset.
pub trait SourceMesh {
    fn vertex_count(&self) -> usize;
    fn positions(&self) -> Vec<Float3>;
    /// Flat triangle list, three indices per triangle
    fn triangle_indices(&self) -> Vec<u32>;
    fn uvs(&self) -> Option<Vec<[f32; 2]>>;
    fn normals(&self) -> Option<Vec<[f32; 3]>>;
    fn tangents(&self) -> Option<Vec<[f32; 4]>>;
    fn colors(&self) -> Option<Vec<[f32; 4]>>;

    /// Bounds as stored on the source; computed from positions when absent
    fn bounds(&self) -> Option<Bounds> {
        None
    }
}

/// Plain owned attribute set, usable directly as a [`SourceMesh`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Float3>,
    pub indices: Vec<u32>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tangents: Option<Vec<[f32; 4]>>,
    pub colors: Option<Vec<[f32; 4]>>,
    pub bounds: Option<Bounds>,
}

impl MeshData {
    pub fn new(positions: Vec<Float3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            ..Default::default()
        }
    }
}

impl SourceMesh for MeshData {
    fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    fn positions(&self) -> Vec<Float3> {
        self.positions.clone()
    }

    fn triangle_indices(&self) -> Vec<u32> {
        self.indices.clone()
    }

    fn uvs(&self) -> Option<Vec<[f32; 2]>> {
        self.uvs.clone()
    }

    fn normals(&self) -> Option<Vec<[f32; 3]>> {
        self.normals.clone()
    }

    fn tangents(&self) -> Option<Vec<[f32; 4]>> {
        self.tangents.clone()
    }

    fn colors(&self) -> Option<Vec<[f32; 4]>> {
        self.colors.clone()
    }

    fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }
}

/// Immutable CPU copy of the source mesh's static attributes.
///
/// Captured once when warm-up ends. The vertex count is fixed for the
/// snapshot's lifetime and every optional attribute has exactly that length.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologySnapshot {
    positions: Vec<Float3>,
    indices: Vec<u32>,
    uvs: Option<Vec<[f32; 2]>>,
    normals: Option<Vec<[f32; 3]>>,
    tangents: Option<Vec<[f32; 4]>>,
    colors: Option<Vec<[f32; 4]>>,
    bounds: Bounds,
}

impl TopologySnapshot {
    pub fn capture(source: &impl SourceMesh) -> Result<Self, SyncError> {
        let positions = source.positions();
        let n = positions.len();
        if n == 0 || source.vertex_count() == 0 {
            return Err(SyncError::EmptyMesh);
        }
        if source.vertex_count() != n {
            return Err(SyncError::AttributeLength {
                attribute: "positions",
                expected: source.vertex_count(),
                actual: n,
            });
        }

        let uvs = check_len("uv", n, source.uvs())?;
        let normals = check_len("normals", n, source.normals())?;
        let tangents = check_len("tangents", n, source.tangents())?;
        let colors = check_len("colors", n, source.colors())?;

        // Non-empty positions always yield a box
        let bounds = match source.bounds() {
            Some(b) => b,
            None => Bounds::from_points(&positions).ok_or(SyncError::EmptyMesh)?,
        };

        Ok(Self {
            indices: source.triangle_indices(),
            positions,
            uvs,
            normals,
            tangents,
            colors,
            bounds,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Float3] {
        &self.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn uvs(&self) -> Option<&[[f32; 2]]> {
        self.uvs.as_deref()
    }

    pub fn normals(&self) -> Option<&[[f32; 3]]> {
        self.normals.as_deref()
    }

    pub fn tangents(&self) -> Option<&[[f32; 4]]> {
        self.tangents.as_deref()
    }

    pub fn colors(&self) -> Option<&[[f32; 4]]> {
        self.colors.as_deref()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}

fn check_len<T>(
    attribute: &'static str,
    expected: usize,
    values: Option<Vec<T>>,
) -> Result<Option<Vec<T>>, SyncError> {
    match values {
        // An empty optional attribute means "not present"
        Some(v) if v.is_empty() => Ok(None),
        Some(v) if v.len() != expected => Err(SyncError::AttributeLength {
            attribute,
            expected,
            actual: v.len(),
        }),
        other => Ok(other),
    }
}
