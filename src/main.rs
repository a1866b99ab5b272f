use bevy::prelude::*;
use bevy::render::renderer::{RenderDevice, RenderQueue};
use meshsync_core::{SourceMesh, SyncConfig};
use meshsync_gpu::{DisplacementBindings, RippleParams, RippleStage};
use meshsync_physics::SharedCollider;
use meshsync_sim::{MeshAssetSource, MeshSyncPlugin, SyncSource};

/// Demo GPU stage driving the displacement buffer
#[derive(Resource)]
struct Ripple {
    stage: RippleStage,
    params: RippleParams,
}

fn main() {
    let config = SyncConfig::default();

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "MeshSync: GPU deformation to collider".into(),
                resolution: (1280.0, 720.0).into(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(ClearColor(Color::srgb(0.02, 0.02, 0.04)))
        .add_plugins(MeshSyncPlugin {
            config,
            ..default()
        })
        .add_systems(Startup, setup_scene)
        .add_systems(Update, (drive_ripple, report_collider))
        .run();
}

fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    device: Res<RenderDevice>,
) {
    let mesh = Mesh::from(Plane3d::default().mesh().size(4.0, 4.0).subdivisions(32));
    let rest = MeshAssetSource(&mesh).positions();
    let config = SyncConfig::default();
    let params = RippleParams::new(rest.len() as u32, [config.bias[0], config.bias[1]]);
    let stage = RippleStage::new(&device, &rest, &params, &config.binding.name);
    info!("Demo: ripple stage over {} vertices", rest.len());

    let handle = meshes.add(mesh);
    commands.spawn((
        Mesh3d(handle.clone()),
        MeshMaterial3d(materials.add(Color::srgb(0.3, 0.5, 0.8))),
    ));
    commands.spawn((
        PointLight {
            intensity: 2_000_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0),
    ));
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(-4.0, 4.5, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.insert_resource(SyncSource(handle));
    commands.insert_resource(Ripple { stage, params });
}

fn drive_ripple(
    mut ripple: ResMut<Ripple>,
    device: Res<RenderDevice>,
    queue: Res<RenderQueue>,
    bindings: Res<DisplacementBindings>,
    time: Res<Time>,
) {
    let ripple = &mut *ripple;
    ripple.params.time = time.elapsed_secs();
    ripple
        .stage
        .dispatch(&device, &queue, &bindings, &ripple.params);
}

/// Log the collider's height range about once a second
fn report_collider(collider: Res<SharedCollider>, time: Res<Time>, mut last: Local<f32>) {
    let now = time.elapsed_secs();
    if now - *last < 1.0 {
        return;
    }
    *last = now;

    let Some(mesh) = collider.latest() else {
        return;
    };
    let (lo, hi) = mesh
        .vertices
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.y), hi.max(v.y)));
    info!(
        "Collider: generation {}, {} vertices, height {:.3}..{:.3}",
        collider.generation(),
        mesh.vertices.len(),
        lo,
        hi
    );
}
