use thiserror::Error;

/// Everything that can go wrong while setting up or running the sync cycle.
///
/// Release paths never produce one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("Vertex count must be positive")]
    ZeroVertexCount,
    #[error("Source mesh has no vertices")]
    EmptyMesh,
    #[error("Graphics backend rejected buffer allocation: {0}")]
    AllocationRejected(String),
    #[error("Displacement channel is not initialized")]
    NotInitialized,
    #[error("Length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Attribute `{attribute}` has {actual} entries, mesh has {expected} vertices")]
    AttributeLength {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Channel sized for {channel} vertices but source mesh has {mesh}")]
    VertexCountMismatch { channel: usize, mesh: usize },
    #[error("Readback failed: {0}")]
    Readback(String),
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
