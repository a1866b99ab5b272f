use bevy::prelude::*;
use bevy::render::renderer::{RenderDevice, RenderQueue};
use bevy::tasks::{ComputeTaskPool, TaskPool};
use meshsync_core::SyncConfig;
use meshsync_gpu::{DisplacementBackend, DisplacementBindings, HostGpuBuffer, RenderBackend};
use meshsync_physics::SharedCollider;

use super::driver::{SyncDriver, SyncState};
use super::source::MeshAssetSource;

/// Mesh whose GPU deformation is mirrored into the collider.
///
/// The handle must already resolve in `Assets<Mesh>` when `PostStartup` runs.
/// A mesh added later, or still loading from disk, is not retried: the
/// plugin logs an error and never creates a driver.
#[derive(Resource, Clone)]
pub struct SyncSource(pub Handle<Mesh>);

/// Where the displacement buffer lives
#[derive(Clone)]
pub enum BackendKind {
    /// Storage buffer on the render device
    Render,
    /// Host memory, written by whoever holds the [`HostGpuBuffer`]
    Host(HostGpuBuffer),
}

#[derive(Resource, Clone)]
struct SyncSettings {
    config: SyncConfig,
    backend: BackendKind,
}

/// Bevy plugin for the deformation sync pipeline.
///
/// Insert a [`SyncSource`] during `Startup`, pointing at a mesh added
/// directly to `Assets<Mesh>`. The driver is created once in `PostStartup`,
/// warms up in `Update` and ticks in `FixedUpdate`.
pub struct MeshSyncPlugin {
    pub config: SyncConfig,
    pub backend: BackendKind,
}

impl Default for MeshSyncPlugin {
    fn default() -> Self {
        Self {
            config: SyncConfig::default(),
            backend: BackendKind::Render,
        }
    }
}

impl Plugin for MeshSyncPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_hz(self.config.fixed_hz))
            .insert_resource(SyncSettings {
                config: self.config.clone(),
                backend: self.backend.clone(),
            })
            .init_resource::<SharedCollider>()
            .init_resource::<DisplacementBindings>()
            .add_systems(PostStartup, begin_sync)
            .add_systems(Update, warm_up_sync.run_if(resource_exists::<SyncDriver>))
            .add_systems(FixedUpdate, sync_tick.run_if(resource_exists::<SyncDriver>))
            .add_systems(Last, dispose_on_exit);
    }
}

#[allow(clippy::too_many_arguments)]
fn begin_sync(
    mut commands: Commands,
    settings: Res<SyncSettings>,
    source: Option<Res<SyncSource>>,
    meshes: Res<Assets<Mesh>>,
    collider: Res<SharedCollider>,
    bindings: Res<DisplacementBindings>,
    device: Option<Res<RenderDevice>>,
    queue: Option<Res<RenderQueue>>,
) {
    let Some(source) = source else {
        warn!("Sync: no SyncSource inserted, nothing to track");
        return;
    };
    let Some(mesh) = meshes.get(&source.0) else {
        error!("Sync: source mesh is not in Assets<Mesh> at PostStartup, sync disabled");
        return;
    };

    let backend: Box<dyn DisplacementBackend> = match &settings.backend {
        BackendKind::Host(gpu) => Box::new(gpu.backend()),
        BackendKind::Render => {
            let (Some(device), Some(queue)) = (device, queue) else {
                error!("Sync: render backend requested but no render device is available");
                return;
            };
            Box::new(RenderBackend::new(
                device.clone(),
                queue.clone(),
                bindings.clone(),
            ))
        }
    };

    let mut driver = match SyncDriver::new(settings.config.clone(), backend, collider.clone()) {
        Ok(driver) => driver,
        Err(e) => {
            error!("Sync: {e}");
            return;
        }
    };
    // start() logs its own failure
    if driver.start(&MeshAssetSource(mesh)).is_ok() {
        commands.insert_resource(driver);
    }
}

fn warm_up_sync(
    mut commands: Commands,
    mut driver: ResMut<SyncDriver>,
    time: Res<Time>,
    source: Option<Res<SyncSource>>,
    meshes: Res<Assets<Mesh>>,
) {
    if driver.state() != SyncState::WarmingUp {
        return;
    }
    let Some(mesh) = source.as_ref().and_then(|s| meshes.get(&s.0)) else {
        error!("Sync: source mesh disappeared during warm-up");
        driver.dispose();
        commands.remove_resource::<SyncDriver>();
        return;
    };
    if driver.advance(time.delta(), &MeshAssetSource(mesh)).is_err() {
        commands.remove_resource::<SyncDriver>();
    }
}

fn sync_tick(mut commands: Commands, mut driver: ResMut<SyncDriver>) {
    let pool = ComputeTaskPool::get_or_init(TaskPool::default);
    if driver.tick(pool).is_err() {
        commands.remove_resource::<SyncDriver>();
    }
}

fn dispose_on_exit(mut exit: EventReader<AppExit>, driver: Option<ResMut<SyncDriver>>) {
    if exit.read().next().is_none() {
        return;
    }
    if let Some(mut driver) = driver {
        driver.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::asset::AssetPlugin;
    use bevy::render::mesh::{Indices, PrimitiveTopology};
    use bevy::render::render_asset::RenderAssetUsages;
    use bevy::time::TimeUpdateStrategy;
    use meshsync_core::Float3;
    use meshsync_physics::deform_vertex;
    use std::time::Duration;

    fn quad_mesh() -> Mesh {
        Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
            .with_inserted_attribute(
                Mesh::ATTRIBUTE_POSITION,
                vec![
                    [-1.0, -1.0, 0.0],
                    [1.0, -1.0, 0.0],
                    [1.0, 1.0, 0.0],
                    [-1.0, 1.0, 0.0],
                ],
            )
            .with_inserted_indices(Indices::U32(vec![0, 1, 2, 0, 2, 3]))
    }

    /// Headless app on the host backend, 50ms of virtual time per update
    fn sync_app(gpu: &HostGpuBuffer, mesh: Option<Mesh>) -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Mesh>()
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(50)))
            .add_plugins(MeshSyncPlugin {
                config: SyncConfig::default(),
                backend: BackendKind::Host(gpu.clone()),
            });
        let handle = match mesh {
            Some(mesh) => app.world_mut().resource_mut::<Assets<Mesh>>().add(mesh),
            None => Handle::default(),
        };
        app.insert_resource(SyncSource(handle));
        app.finish();
        app.cleanup();
        app
    }

    fn run(app: &mut App, updates: usize) {
        for _ in 0..updates {
            app.update();
        }
    }

    fn driver_state(app: &App) -> Option<SyncState> {
        app.world().get_resource::<SyncDriver>().map(SyncDriver::state)
    }

    #[test]
    fn test_publishes_after_settle_delay() {
        let gpu = HostGpuBuffer::default();
        let mut app = sync_app(&gpu, Some(quad_mesh()));

        // PostStartup allocates the channel
        run(&mut app, 1);
        assert_eq!(driver_state(&app), Some(SyncState::WarmingUp));
        assert_eq!(gpu.len(), Some(4));

        let offsets = vec![
            Float3::new(0.1, 0.2, 0.3),
            Float3::new(-0.5, 0.0, 1.0),
            Float3::new(2.0, 2.0, 2.0),
            Float3::ZERO,
        ];
        assert!(gpu.write(&offsets));

        // At most 200ms of virtual time has passed
        run(&mut app, 4);
        let collider = app.world().resource::<SharedCollider>().clone();
        assert!(collider.latest().is_none());
        assert_eq!(driver_state(&app), Some(SyncState::WarmingUp));

        // Settle delay elapses, then the next fixed step publishes
        run(&mut app, 2);
        assert_eq!(driver_state(&app), Some(SyncState::Ready));
        let published = collider.latest().unwrap();
        let bias = SyncConfig::default().bias;
        let expected: Vec<Float3> = offsets.iter().map(|&o| deform_vertex(o, bias)).collect();
        assert_eq!(published.vertices, expected);
        assert_eq!(published.indices(), &[0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_empty_mesh_creates_no_driver() {
        let gpu = HostGpuBuffer::default();
        let empty = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
        let mut app = sync_app(&gpu, Some(empty));

        run(&mut app, 3);
        assert!(driver_state(&app).is_none());
        assert!(!gpu.is_bound());
        assert_eq!(gpu.allocation_count(), 0);
    }

    #[test]
    fn test_unloaded_source_creates_no_driver() {
        let gpu = HostGpuBuffer::default();
        let mut app = sync_app(&gpu, None);

        run(&mut app, 3);
        assert!(driver_state(&app).is_none());
        assert!(!gpu.is_bound());
    }

    #[test]
    fn test_resized_mesh_during_warm_up_disposes() {
        let gpu = HostGpuBuffer::default();
        let mut app = sync_app(&gpu, Some(quad_mesh()));
        run(&mut app, 1);
        assert!(gpu.is_bound());

        let handle = app.world().resource::<SyncSource>().0.clone();
        let mut meshes = app.world_mut().resource_mut::<Assets<Mesh>>();
        let mesh = meshes.get_mut(&handle).unwrap();
        mesh.insert_attribute(
            Mesh::ATTRIBUTE_POSITION,
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        );
        mesh.insert_indices(Indices::U32(vec![0, 1, 2]));

        run(&mut app, 7);
        assert!(driver_state(&app).is_none());
        assert!(!gpu.is_bound());
        assert!(app.world().resource::<SharedCollider>().latest().is_none());
    }

    #[test]
    fn test_app_exit_releases_buffer() {
        let gpu = HostGpuBuffer::default();
        let mut app = sync_app(&gpu, Some(quad_mesh()));
        run(&mut app, 8);
        assert_eq!(driver_state(&app), Some(SyncState::Ready));
        assert!(gpu.is_bound());

        app.world_mut().send_event(AppExit::Success);
        app.update();
        assert_eq!(driver_state(&app), Some(SyncState::Disposed));
        assert!(!gpu.is_bound());
    }
}
