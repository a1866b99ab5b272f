use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bevy::prelude::Resource;
use meshsync_core::{Bounds, Float3, TopologySnapshot, RUNTIME_MESH_NAME};

/// Mutable mesh whose vertices are rewritten every tick.
///
/// The vertex buffer is allocated once at the warm-up transition and only
/// ever overwritten in place.
#[derive(Debug, Clone)]
pub struct RuntimeMesh {
    pub name: &'static str,
    pub topology: Arc<TopologySnapshot>,
    pub vertices: Vec<Float3>,
}

impl RuntimeMesh {
    /// Starts from the snapshot's rest positions
    pub fn new(topology: Arc<TopologySnapshot>) -> Self {
        let vertices = topology.positions().to_vec();
        Self {
            name: RUNTIME_MESH_NAME,
            topology,
            vertices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Triangle-soup snapshot handed to the physics side
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionMesh {
    pub name: &'static str,
    pub vertices: Vec<Float3>,
    pub topology: Arc<TopologySnapshot>,
}

impl CollisionMesh {
    pub fn from_runtime(mesh: &RuntimeMesh) -> Self {
        Self {
            name: mesh.name,
            vertices: mesh.vertices.clone(),
            topology: Arc::clone(&mesh.topology),
        }
    }

    pub fn indices(&self) -> &[u32] {
        self.topology.indices()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.topology
            .indices()
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
    }

    pub fn bounds(&self) -> Bounds {
        self.topology.bounds()
    }
}

/// Receives the collision shape. No validation of the mesh is expected.
pub trait ColliderSink: Send + Sync {
    fn set_shared_mesh(&mut self, mesh: &RuntimeMesh);
}

/// Collider whose active shape can be read from anywhere.
/// Clones share the same slot.
#[derive(Resource, Clone, Default)]
pub struct SharedCollider {
    mesh: Arc<RwLock<Option<Arc<CollisionMesh>>>>,
    generation: Arc<AtomicU64>,
}

impl SharedCollider {
    /// Currently active shape, if anything has been published
    pub fn latest(&self) -> Option<Arc<CollisionMesh>> {
        self.mesh
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bumped on every publish
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl ColliderSink for SharedCollider {
    fn set_shared_mesh(&mut self, mesh: &RuntimeMesh) {
        let snapshot = Arc::new(CollisionMesh::from_runtime(mesh));
        *self.mesh.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Replaces the active collision shape with the runtime mesh
pub struct ColliderPublisher {
    sink: Box<dyn ColliderSink>,
    published: u64,
}

impl ColliderPublisher {
    pub fn new(sink: impl ColliderSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            published: 0,
        }
    }

    pub fn publish(&mut self, mesh: &RuntimeMesh) {
        self.sink.set_shared_mesh(mesh);
        self.published += 1;
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}
