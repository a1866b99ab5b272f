pub mod driver;
pub mod pipeline;
pub mod source;

pub use driver::{SyncDriver, SyncState};
pub use pipeline::{BackendKind, MeshSyncPlugin, SyncSource};
pub use source::MeshAssetSource;
