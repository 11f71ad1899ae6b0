use bevy::prelude::*;
use rand::seq::IteratorRandom;

use snackman_audio::audio::spawn_listener;
use snackman_audio::{
    GameStore, GameStorePlugin, SoundEffect, SoundGroup, SoundParameters, SoundPlugin,
    SoundService,
};

const ROUND_SECONDS: i32 = 120;
const CALORIES_PER_SNACK: i32 = 150;
const VOLUME_STEP: f32 = 0.1;

fn main() {
    App::new()
        .add_plugins((DefaultPlugins, SoundPlugin, GameStorePlugin))
        .insert_resource(CountdownTimer(Timer::from_seconds(1.0, TimerMode::Repeating)))
        .insert_resource(CackleTimer(Timer::from_seconds(4.0, TimerMode::Repeating)))
        .add_systems(
            Startup,
            (spawn_scene, attach_sounds.after(spawn_listener)).chain(),
        )
        .add_systems(
            Update,
            (keyboard_controls, random_cackle_system, countdown_system),
        )
        .run();
}

#[derive(Component)]
struct Flock;

/// Where the eating sound comes from.
#[derive(Component)]
struct Mouth;

#[derive(Component)]
struct Feet;

#[derive(Resource)]
struct CountdownTimer(Timer);

#[derive(Resource)]
struct CackleTimer(Timer);

fn spawn_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut store: ResMut<GameStore>,
) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 6.0, 12.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight::default(),
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // The snack man: the sounds sit on empty child nodes at the mouth and feet
    commands
        .spawn((
            Mesh3d(meshes.add(Sphere::new(0.5))),
            MeshMaterial3d(materials.add(Color::srgb(1.0, 0.85, 0.1))),
            Transform::from_xyz(0.0, 0.5, 0.0),
        ))
        .with_children(|parent| {
            parent.spawn((Mouth, Transform::from_xyz(0.0, 0.1, 0.5)));
            parent.spawn((Feet, Transform::from_xyz(0.0, -0.5, 0.0)));
        });

    let chicken_mesh = meshes.add(Cuboid::new(0.6, 0.6, 0.6));
    let chicken_material = materials.add(Color::WHITE);
    commands
        .spawn((
            Flock,
            SoundGroup,
            Transform::from_xyz(0.0, 0.3, -4.0),
            Visibility::default(),
        ))
        .with_children(|parent| {
            for x in [-3.0, 0.0, 3.0] {
                parent.spawn((
                    Mesh3d(chicken_mesh.clone()),
                    MeshMaterial3d(chicken_material.clone()),
                    Transform::from_xyz(x, 0.0, 0.0),
                ));
            }
        });

    store.set_remaining_time(ROUND_SECONDS);
    store.set_calories(0);
}

fn attach_sounds(
    mut sounds: SoundService,
    camera: Single<Entity, With<Camera3d>>,
    flock: Single<Entity, With<Flock>>,
    mouth: Single<Entity, With<Mouth>>,
    feet: Single<Entity, With<Feet>>,
) {
    sounds.attach_listener_to(*camera);

    sounds.add_positional_audio(
        SoundEffect::Chicken,
        *flock,
        SoundParameters {
            volume: 0.6,
            ref_distance: Some(2.0),
            rolloff: Some(1.5),
            max_distance: Some(30.0),
            ..default()
        },
    );

    let close_by = SoundParameters {
        volume: 0.8,
        ..default()
    };
    sounds.add_single_audio(SoundEffect::Eat, *mouth, close_by);
    sounds.add_single_audio(SoundEffect::Jump, *feet, close_by);

    sounds.start_background_music();
}

// E eat, J jump, C cackle, S silence the chickens, M music, +/- volume
fn keyboard_controls(
    keys: Res<ButtonInput<KeyCode>>,
    mut sounds: SoundService,
    mut store: ResMut<GameStore>,
    flock: Single<(Entity, &Children), With<Flock>>,
    mouth: Single<Entity, With<Mouth>>,
    feet: Single<Entity, With<Feet>>,
) {
    let (flock_entity, chickens) = *flock;

    if keys.just_pressed(KeyCode::KeyE) {
        sounds.play_sound(*mouth);
        let calories = store.calories() + CALORIES_PER_SNACK;
        store.set_calories(calories);
    }
    if keys.just_pressed(KeyCode::KeyJ) {
        sounds.play_sound(*feet);
    }
    if keys.just_pressed(KeyCode::KeyC) {
        if let Some(chicken) = chickens.iter().choose(&mut rand::thread_rng()) {
            sounds.play_sound(chicken);
        }
    }
    if keys.just_pressed(KeyCode::KeyS) {
        sounds.stop_sound(flock_entity);
    }
    if keys.just_pressed(KeyCode::KeyM) {
        if sounds.is_music_playing() {
            sounds.stop_background_music();
        } else {
            sounds.start_background_music();
        }
    }
    if keys.just_pressed(KeyCode::Equal) {
        let level = (sounds.volume() + VOLUME_STEP).min(1.0);
        sounds.set_volume(level);
        info!("Volume: {:.1}", level);
    }
    if keys.just_pressed(KeyCode::Minus) {
        let level = (sounds.volume() - VOLUME_STEP).max(0.0);
        sounds.set_volume(level);
        info!("Volume: {:.1}", level);
    }
}

/// Every few seconds a random chicken cackles, unless it still is.
fn random_cackle_system(
    time: Res<Time>,
    mut timer: ResMut<CackleTimer>,
    mut sounds: SoundService,
    chickens: Single<&Children, With<Flock>>,
) {
    if !timer.0.tick(time.delta()).just_finished() {
        return;
    }
    let mut rng = rand::thread_rng();
    if let Some(chicken) = chickens.iter().choose(&mut rng) {
        sounds.play_sound(chicken);
    }
}

fn countdown_system(
    time: Res<Time>,
    mut timer: ResMut<CountdownTimer>,
    mut store: ResMut<GameStore>,
    mut sounds: SoundService,
    flock: Single<Entity, With<Flock>>,
) {
    if store.remaining_time() <= 0 || !timer.0.tick(time.delta()).just_finished() {
        return;
    }

    let remaining = store.remaining_time() - 1;
    store.set_remaining_time(remaining);

    if remaining == 0 {
        info!("Time's up! {} calories eaten", store.calories());
        sounds.stop_sound(*flock);
        sounds.stop_background_music();
    }
}
