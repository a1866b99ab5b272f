use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::SyncError;
use crate::types::BufferBinding;

/// Sync pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds to wait after allocating the channel before the first readback
    pub settle_delay_secs: f32,
    /// (x, y) frame correction added to every read-back position
    pub bias: [f32; 2],
    /// Vertices per parallel work unit
    pub batch_size: usize,
    /// Where the GPU stage finds the displacement buffer
    pub binding: BufferBinding,
    /// Fixed tick rate the host drives the sync at
    pub fixed_hz: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: SETTLE_DELAY_SECS,
            bias: [BIAS_X, BIAS_Y],
            batch_size: BATCH_SIZE,
            binding: BufferBinding::default(),
            fixed_hz: FIXED_TICK_HZ,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.batch_size == 0 {
            return Err(SyncError::InvalidConfig("batch_size must be positive".into()));
        }
        if !self.settle_delay_secs.is_finite() || self.settle_delay_secs < 0.0 {
            return Err(SyncError::InvalidConfig(format!(
                "settle_delay_secs must be a finite, non-negative number (got {})",
                self.settle_delay_secs
            )));
        }
        if self.bias.iter().any(|b| !b.is_finite()) {
            return Err(SyncError::InvalidConfig(format!(
                "bias must be finite (got {:?})",
                self.bias
            )));
        }
        if !self.fixed_hz.is_finite() || self.fixed_hz <= 0.0 {
            return Err(SyncError::InvalidConfig(format!(
                "fixed_hz must be positive (got {})",
                self.fixed_hz
            )));
        }
        if self.binding.name.is_empty() {
            return Err(SyncError::InvalidConfig("binding name is empty".into()));
        }
        Ok(())
    }
}
