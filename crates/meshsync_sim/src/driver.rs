use std::sync::Arc;
use std::time::Duration;

use bevy::log::{debug, error, info};
use bevy::prelude::Resource;
use bevy::tasks::TaskPool;
use bevy::time::{Timer, TimerMode};
use meshsync_core::{Float3, SourceMesh, SyncConfig, SyncError, TopologySnapshot};
use meshsync_gpu::{DisplacementBackend, DisplacementChannel};
use meshsync_physics::{ColliderPublisher, ColliderSink, DeformationApplier, RuntimeMesh};

/// Driver lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Uninitialized,
    WarmingUp,
    Ready,
    Disposed,
}

impl SyncState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::WarmingUp => "warming up",
            Self::Ready => "ready",
            Self::Disposed => "disposed",
        }
    }
}

/// Per-vertex storage that exists only in the Ready state
struct SyncBuffers {
    topology: Arc<TopologySnapshot>,
    offsets: Vec<Float3>,
    runtime: RuntimeMesh,
}

/// Runs the readback -> apply -> publish cycle.
///
/// `start` allocates the channel, `advance` counts down the settle delay and
/// captures the topology once it elapses, and `tick` runs one cycle. Any
/// failure disposes the driver; there is no partial mode.
#[derive(Resource)]
pub struct SyncDriver {
    config: SyncConfig,
    state: SyncState,
    channel: DisplacementChannel,
    publisher: ColliderPublisher,
    applier: DeformationApplier,
    settle: Timer,
    buffers: Option<SyncBuffers>,
    ticks: u64,
}

impl SyncDriver {
    pub fn new(
        config: SyncConfig,
        backend: impl DisplacementBackend + 'static,
        collider: impl ColliderSink + 'static,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let backend: Box<dyn DisplacementBackend> = Box::new(backend);
        Ok(Self {
            applier: DeformationApplier::from_config(&config)?,
            channel: DisplacementChannel::new(backend, config.binding.clone()),
            publisher: ColliderPublisher::new(collider),
            settle: Timer::from_seconds(config.settle_delay_secs, TimerMode::Once),
            state: SyncState::Uninitialized,
            buffers: None,
            ticks: 0,
            config,
        })
    }

    /// Uninitialized -> WarmingUp: size the channel from the source mesh
    pub fn start(&mut self, source: &impl SourceMesh) -> Result<(), SyncError> {
        self.expect_state(SyncState::Uninitialized, "start")?;

        let vertex_count = source.vertex_count();
        if let Err(e) = self.channel.initialize(vertex_count) {
            return Err(self.fail(e));
        }

        self.settle.reset();
        self.state = SyncState::WarmingUp;
        info!(
            "Sync: warming up for {:.2}s ({} vertices)",
            self.config.settle_delay_secs, vertex_count
        );
        Ok(())
    }

    /// Counts down the settle delay. Returns true once the driver is Ready.
    pub fn advance(
        &mut self,
        delta: Duration,
        source: &impl SourceMesh,
    ) -> Result<bool, SyncError> {
        match self.state {
            SyncState::Ready => return Ok(true),
            SyncState::WarmingUp => {}
            _ => return Ok(false),
        }

        self.settle.tick(delta);
        if !self.settle.finished() {
            return Ok(false);
        }

        match self.finish_warm_up(source) {
            Ok(()) => Ok(true),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// WarmingUp -> Ready: capture the topology and allocate per-vertex buffers
    fn finish_warm_up(&mut self, source: &impl SourceMesh) -> Result<(), SyncError> {
        let topology = Arc::new(TopologySnapshot::capture(source)?);
        let channel_count = self.channel.vertex_count().ok_or(SyncError::NotInitialized)?;
        if topology.vertex_count() != channel_count {
            return Err(SyncError::VertexCountMismatch {
                channel: channel_count,
                mesh: topology.vertex_count(),
            });
        }

        self.buffers = Some(SyncBuffers {
            offsets: vec![Float3::ZERO; channel_count],
            runtime: RuntimeMesh::new(Arc::clone(&topology)),
            topology,
        });
        self.state = SyncState::Ready;
        info!("Sync: ready, {} vertices per tick", channel_count);
        Ok(())
    }

    /// One fixed-rate cycle. Returns false when per-tick work is disabled.
    pub fn tick(&mut self, pool: &TaskPool) -> Result<bool, SyncError> {
        if self.state != SyncState::Ready {
            return Ok(false);
        }
        match self.run_cycle(pool) {
            Ok(()) => {
                self.ticks += 1;
                Ok(true)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn run_cycle(&mut self, pool: &TaskPool) -> Result<(), SyncError> {
        let buffers = self.buffers.as_mut().ok_or(SyncError::NotInitialized)?;
        self.channel.read_into(&mut buffers.offsets)?;
        self.applier.apply(
            pool,
            buffers.topology.positions(),
            &buffers.offsets,
            &mut buffers.runtime.vertices,
        )?;
        self.publisher.publish(&buffers.runtime);
        debug!("Sync: tick {} published", self.ticks + 1);
        Ok(())
    }

    /// Release the channel and both buffers. Safe in any state, any number of times.
    pub fn dispose(&mut self) {
        if self.state == SyncState::Disposed {
            return;
        }
        self.channel.release();
        self.buffers = None;
        self.state = SyncState::Disposed;
        info!("Sync: disposed after {} ticks", self.ticks);
    }

    fn fail(&mut self, e: SyncError) -> SyncError {
        error!("Sync: {e} (while {})", self.state.name());
        self.dispose();
        e
    }

    fn expect_state(&self, expected: SyncState, operation: &'static str) -> Result<(), SyncError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SyncError::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn channel(&self) -> &DisplacementChannel {
        &self.channel
    }

    pub fn topology(&self) -> Option<&TopologySnapshot> {
        self.buffers.as_ref().map(|b| b.topology.as_ref())
    }

    pub fn offsets(&self) -> Option<&[Float3]> {
        self.buffers.as_ref().map(|b| b.offsets.as_slice())
    }

    pub fn runtime_mesh(&self) -> Option<&RuntimeMesh> {
        self.buffers.as_ref().map(|b| &b.runtime)
    }
}

impl Drop for SyncDriver {
    fn drop(&mut self) {
        self.dispose();
    }
}
