pub mod config;
pub mod constants;
pub mod error;
pub mod topology;
pub mod types;

pub use config::SyncConfig;
pub use constants::*;
pub use error::SyncError;
pub use topology::*;
pub use types::*;
