pub mod applier;
pub mod collider;

pub use applier::{deform_vertex, DeformationApplier};
pub use collider::{CollisionMesh, ColliderPublisher, ColliderSink, RuntimeMesh, SharedCollider};
