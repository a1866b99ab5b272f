use bevy::log::warn;
use bevy::render::mesh::{Mesh, MeshVertexAttribute, VertexAttributeValues};
use bevy::render::render_resource::VertexFormat;
use meshsync_core::{Float3, SourceMesh};

/// Reads a bevy [`Mesh`] asset as a [`SourceMesh`]
pub struct MeshAssetSource<'a>(pub &'a Mesh);

impl MeshAssetSource<'_> {
    fn float32x2(&self, attribute: MeshVertexAttribute) -> Option<Vec<[f32; 2]>> {
        float32x2_values(attribute.name, self.0.attribute(attribute)?)
    }

    fn float32x3(&self, attribute: MeshVertexAttribute) -> Option<Vec<[f32; 3]>> {
        float32x3_values(attribute.name, self.0.attribute(attribute)?)
    }

    fn float32x4(&self, attribute: MeshVertexAttribute) -> Option<Vec<[f32; 4]>> {
        float32x4_values(attribute.name, self.0.attribute(attribute)?)
    }
}

// Attributes stored in any other format are left out of the snapshot.

fn unsupported(name: &str, values: &VertexAttributeValues, expected: VertexFormat) {
    warn!(
        "Mesh source: `{}` is {:?}, only {:?} is read; attribute skipped",
        name,
        VertexFormat::from(values),
        expected
    );
}

fn float32x2_values(name: &str, values: &VertexAttributeValues) -> Option<Vec<[f32; 2]>> {
    match values {
        VertexAttributeValues::Float32x2(v) => Some(v.clone()),
        other => {
            unsupported(name, other, VertexFormat::Float32x2);
            None
        }
    }
}

fn float32x3_values(name: &str, values: &VertexAttributeValues) -> Option<Vec<[f32; 3]>> {
    match values {
        VertexAttributeValues::Float32x3(v) => Some(v.clone()),
        other => {
            unsupported(name, other, VertexFormat::Float32x3);
            None
        }
    }
}

fn float32x4_values(name: &str, values: &VertexAttributeValues) -> Option<Vec<[f32; 4]>> {
    match values {
        VertexAttributeValues::Float32x4(v) => Some(v.clone()),
        other => {
            unsupported(name, other, VertexFormat::Float32x4);
            None
        }
    }
}

impl SourceMesh for MeshAssetSource<'_> {
    fn vertex_count(&self) -> usize {
        self.0.count_vertices()
    }

    fn positions(&self) -> Vec<Float3> {
        self.float32x3(Mesh::ATTRIBUTE_POSITION)
            .map(|v| v.into_iter().map(Float3::from).collect())
            .unwrap_or_default()
    }

    fn triangle_indices(&self) -> Vec<u32> {
        match self.0.indices() {
            Some(indices) => indices.iter().map(|i| i as u32).collect(),
            // Non-indexed meshes are a plain triangle list
            None => (0..self.0.count_vertices() as u32).collect(),
        }
    }

    fn uvs(&self) -> Option<Vec<[f32; 2]>> {
        self.float32x2(Mesh::ATTRIBUTE_UV_0)
    }

    fn normals(&self) -> Option<Vec<[f32; 3]>> {
        self.float32x3(Mesh::ATTRIBUTE_NORMAL)
    }

    fn tangents(&self) -> Option<Vec<[f32; 4]>> {
        self.float32x4(Mesh::ATTRIBUTE_TANGENT)
    }

    fn colors(&self) -> Option<Vec<[f32; 4]>> {
        self.float32x4(Mesh::ATTRIBUTE_COLOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::render::mesh::{Indices, PrimitiveTopology};
    use bevy::render::render_asset::RenderAssetUsages;
    use meshsync_core::TopologySnapshot;

    fn triangle() -> Mesh {
        Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
            .with_inserted_attribute(
                Mesh::ATTRIBUTE_POSITION,
                vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            )
            .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, vec![[0.0, 0.0, 1.0]; 3])
            .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]])
            .with_inserted_indices(Indices::U16(vec![0, 1, 2]))
    }

    #[test]
    fn test_reads_bevy_mesh_attributes() {
        let mesh = triangle();
        let source = MeshAssetSource(&mesh);
        assert_eq!(source.vertex_count(), 3);
        assert_eq!(source.positions()[1], Float3::new(1.0, 0.0, 0.0));
        assert_eq!(source.triangle_indices(), vec![0, 1, 2]);
        assert_eq!(source.normals().unwrap().len(), 3);
        assert!(source.tangents().is_none());
        assert!(source.colors().is_none());

        let snap = TopologySnapshot::capture(&source).unwrap();
        assert_eq!(snap.vertex_count(), 3);
        assert_eq!(snap.uvs().unwrap()[2], [0.0, 1.0]);
    }

    #[test]
    fn test_unsupported_attribute_format_is_skipped() {
        let packed = VertexAttributeValues::Unorm8x4(vec![[255, 0, 0, 255]; 3]);
        assert!(float32x4_values("Vertex_Color", &packed).is_none());
        assert!(float32x3_values("Vertex_Normal", &packed).is_none());
        assert!(float32x2_values("Vertex_Uv", &packed).is_none());

        let colors = VertexAttributeValues::Float32x4(vec![[1.0, 0.0, 0.0, 1.0]; 3]);
        assert_eq!(float32x4_values("Vertex_Color", &colors).unwrap().len(), 3);
    }

    #[test]
    fn test_empty_bevy_mesh() {
        let mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
        let source = MeshAssetSource(&mesh);
        assert_eq!(source.vertex_count(), 0);
        assert!(TopologySnapshot::capture(&source).is_err());
    }
}
