// audio.rs - Sound library, emitters and the systems that drive them
//
// In Bevy a sound plays while an entity carries an AudioPlayer component:
// Bevy's audio systems see it, build a sink, and start the playback. So
// "playing a sound" here means inserting that component on an emitter
// entity, and "stopping" means removing it again.
//
// Emitters are child entities of the scene object they belong to. They
// inherit its Transform, which makes the sound follow the object around.

use std::collections::HashMap;

use bevy::{
    asset::LoadState,
    audio::{AudioSinkPlayback, DefaultSpatialScale, GlobalVolume, Volume},
    prelude::*,
};

use crate::attenuation::{compensated_volume, Attenuation};
use crate::config::{load_sound_config, SoundConfig};
use crate::sound_service::on_sound_request;

pub struct SoundPlugin;

impl Plugin for SoundPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SoundVolume>()
            .init_resource::<PendingAudio>()
            .add_systems(
                PreStartup,
                (
                    load_sound_config.run_if(not(resource_exists::<SoundConfig>)),
                    (
                        load_sound_library.run_if(not(resource_exists::<SoundLibrary>)),
                        apply_initial_volume,
                    ),
                )
                    .chain(),
            )
            .add_systems(
                Startup,
                (
                    spawn_listener.run_if(not(resource_exists::<SoundListener>)),
                    spawn_music_player,
                ),
            )
            .add_systems(Update, attach_loaded_audio)
            // The engine's own audio systems run in PostUpdate, so do we:
            // by then every command queued during Update has been applied.
            // The tracker must look before the music starter flags a new
            // track as playing, or it would flag it right back.
            .add_systems(
                PostUpdate,
                (
                    (track_finished_playback, start_loaded_music).chain(),
                    apply_distance_attenuation,
                )
                    .in_set(SoundSystems::Playback),
            )
            .add_observer(on_sound_request);
    }
}

/// System set of the PostUpdate sound bookkeeping.
///
/// `SoundService` calls made during Update are always safe. A system that
/// plays sounds in PostUpdate has to run `.before(SoundSystems::Playback)`,
/// otherwise the tracker can see the emitter flagged as playing before its
/// AudioPlayer has been inserted, and flag it as finished.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SoundSystems {
    Playback,
}

/// The closed set of sound effects the game knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundEffect {
    Eat,
    Chicken,
    Jump,
}

impl SoundEffect {
    pub const ALL: [SoundEffect; 3] = [
        SoundEffect::Eat,
        SoundEffect::Chicken,
        SoundEffect::Jump,
    ];
}

/// How a freshly attached emitter should behave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundParameters {
    /// Start playing as soon as the sound is attached.
    pub autoplaying: bool,
    pub looping: bool,
    /// Linear gain, 0..1.
    pub volume: f32,
    pub ref_distance: Option<f32>,
    pub rolloff: Option<f32>,
    pub max_distance: Option<f32>,
}

impl Default for SoundParameters {
    fn default() -> Self {
        Self {
            autoplaying: false,
            looping: false,
            volume: 1.0,
            ref_distance: None,
            rolloff: None,
            max_distance: None,
        }
    }
}

impl SoundParameters {
    pub fn attenuation(&self) -> Attenuation {
        Attenuation {
            ref_distance: self.ref_distance,
            rolloff: self.rolloff,
            max_distance: self.max_distance,
        }
    }
}

/// Marks an entity whose children are the sound sources, like a flock of
/// chickens. `stop_sound` on a group stops every child.
#[derive(Component, Default)]
pub struct SoundGroup;

/// A spatial sound attached as a child entity of a scene node.
///
/// The emitter only holds the settings. Playback itself happens through
/// Bevy's AudioPlayer, which is inserted on the same entity while playing.
#[derive(Component, Debug, Clone)]
#[require(Transform)]
pub struct PositionalAudio {
    pub effect: SoundEffect,
    pub source: Handle<AudioSource>,
    pub volume: f32,
    pub looping: bool,
    pub attenuation: Attenuation,
    pub(crate) playing: bool,
}

impl PositionalAudio {
    pub fn new(effect: SoundEffect, source: Handle<AudioSource>, params: &SoundParameters) -> Self {
        PositionalAudio {
            effect,
            source,
            volume: params.volume,
            looping: params.looping,
            attenuation: params.attenuation(),
            playing: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Non-looping sounds use REMOVE so the engine strips the player when the
    /// sound ends and `track_finished_playback` can notice.
    pub fn playback_settings(&self) -> PlaybackSettings {
        let settings = if self.looping {
            PlaybackSettings::LOOP
        } else {
            PlaybackSettings::REMOVE
        };
        settings
            .with_volume(Volume::Linear(self.volume))
            .with_spatial(true)
    }
}

/// The single background music player. Lives as long as the app.
#[derive(Component, Debug, Default)]
pub struct MusicPlayer {
    pub(crate) playing: bool,
}

impl MusicPlayer {
    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

/// Global volume applied to the music and to every `play_sound` call.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct SoundVolume(pub f32);

impl Default for SoundVolume {
    fn default() -> Self {
        SoundVolume(0.5)
    }
}

/// The entity carrying the SpatialListener every emitter is heard from.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundListener(pub Entity);

/// Maps each sound effect to its audio asset, plus the music track.
///
/// Handle<T> is cheap to clone, so the library hands out clones and keeps
/// the originals alive for the lifetime of the app.
#[derive(Resource, Debug, Clone)]
pub struct SoundLibrary {
    effects: HashMap<SoundEffect, Handle<AudioSource>>,
    music: Handle<AudioSource>,
}

impl SoundLibrary {
    /// Starts loading every asset. Returns immediately, decoding happens in
    /// the background.
    pub fn load(asset_server: &AssetServer, config: &SoundConfig) -> Self {
        let effects: HashMap<SoundEffect, Handle<AudioSource>> = SoundEffect::ALL
            .iter()
            .map(|&effect| {
                let path = config.effect_path(effect).to_string();
                (effect, asset_server.load(path))
            })
            .collect();
        SoundLibrary {
            effects,
            music: asset_server.load(config.music.clone()),
        }
    }

    pub fn from_handles(
        effects: impl IntoIterator<Item = (SoundEffect, Handle<AudioSource>)>,
        music: Handle<AudioSource>,
    ) -> Self {
        SoundLibrary {
            effects: effects.into_iter().collect(),
            music,
        }
    }

    pub fn get(&self, effect: SoundEffect) -> Option<&Handle<AudioSource>> {
        self.effects.get(&effect)
    }

    pub fn insert(&mut self, effect: SoundEffect, source: Handle<AudioSource>) {
        self.effects.insert(effect, source);
    }

    pub fn remove(&mut self, effect: SoundEffect) -> Option<Handle<AudioSource>> {
        self.effects.remove(&effect)
    }

    pub fn music(&self) -> &Handle<AudioSource> {
        &self.music
    }
}

/// Where a decoded sound should end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachTarget {
    /// One emitter on every child of this entity, enumerated once decoded.
    EachChildOf(Entity),
    /// One emitter on this entity itself.
    Node(Entity),
}

#[derive(Debug, Clone)]
pub struct PendingAttachment {
    pub effect: SoundEffect,
    pub source: Handle<AudioSource>,
    pub target: AttachTarget,
    pub params: SoundParameters,
}

/// Requests waiting for their asset to finish decoding.
///
/// Nothing ever cancels these: stopping the music while a start is still
/// queued does not stop the start from happening later.
#[derive(Resource, Debug, Default)]
pub struct PendingAudio {
    pub attachments: Vec<PendingAttachment>,
    pub music: Vec<Handle<AudioSource>>,
}

enum LoadProgress {
    Ready,
    Waiting,
    Failed(String),
}

fn load_progress(
    source: &Handle<AudioSource>,
    sources: &Assets<AudioSource>,
    asset_server: &AssetServer,
) -> LoadProgress {
    if sources.contains(source.id()) {
        return LoadProgress::Ready;
    }
    match asset_server.get_load_state(source.id()) {
        Some(LoadState::Failed(err)) => LoadProgress::Failed(err.to_string()),
        _ => LoadProgress::Waiting,
    }
}

pub fn load_sound_library(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    config: Res<SoundConfig>,
) {
    commands.insert_resource(SoundLibrary::load(&asset_server, &config));
}

pub fn apply_initial_volume(config: Res<SoundConfig>, mut volume: ResMut<SoundVolume>) {
    volume.0 = config.initial_volume;
}

/// Spawns the one SpatialListener of the game. It sits at the origin until
/// `SoundService::attach_listener_to` parents it to a camera or player.
pub fn spawn_listener(mut commands: Commands) {
    let listener = commands
        .spawn((SpatialListener::default(), Transform::default()))
        .id();
    commands.insert_resource(SoundListener(listener));
}

/// The music player lives for the whole game; only its AudioPlayer comes
/// and goes.
pub fn spawn_music_player(mut commands: Commands) {
    commands.spawn((Name::new("Background Music"), MusicPlayer::default()));
}

/// Attaches emitters for every pending request whose asset has decoded.
///
/// `asset_server.load()` hands out a Handle right away, but the audio data
/// only shows up in `Assets<AudioSource>` a few frames later. Requests that
/// arrive before that wait in PendingAudio, and this system checks them
/// again every frame until the data is there (or the load has failed).
pub fn attach_loaded_audio(
    mut commands: Commands,
    mut pending: ResMut<PendingAudio>,
    sources: Res<Assets<AudioSource>>,
    asset_server: Res<AssetServer>,
    nodes: Query<Entity>,
    children: Query<&Children>,
) {
    // Take the whole queue out of the resource. Anything still loading is
    // pushed back, so the queue ends up holding only the waiting requests.
    let queued = std::mem::take(&mut pending.attachments);

    for attachment in queued {
        match load_progress(&attachment.source, &sources, &asset_server) {
            LoadProgress::Waiting => {
                pending.attachments.push(attachment);
                continue;
            }
            LoadProgress::Failed(err) => {
                // Missing file, unknown format... there is nothing to retry,
                // so the request is dropped.
                warn!("Could not load {:?} sound: {}", attachment.effect, err);
                continue;
            }
            LoadProgress::Ready => {}
        }

        // A group's children are read now, not when the request was made,
        // so members added while the sound was loading get an emitter too.
        let targets: Vec<Entity> = match attachment.target {
            AttachTarget::EachChildOf(group) => children
                .get(group)
                .map(|members| members.iter().collect())
                .unwrap_or_default(),
            AttachTarget::Node(node) => vec![node],
        };

        for target in targets {
            // The node may have been despawned while we were waiting.
            if !nodes.contains(target) {
                debug!("Skipping {:?} sound, {:?} no longer exists", attachment.effect, target);
                continue;
            }
            spawn_emitter(&mut commands, target, &attachment);
        }
    }
}

/// Spawns one emitter as a child of `parent`.
fn spawn_emitter(commands: &mut Commands, parent: Entity, attachment: &PendingAttachment) {
    let mut emitter = PositionalAudio::new(
        attachment.effect,
        attachment.source.clone(),
        &attachment.params,
    );

    // Autoplaying emitters are spawned with their AudioPlayer already on, so
    // they start in the same frame. The others wait for `play_sound`.
    if attachment.params.autoplaying {
        emitter.playing = true;
        let settings = emitter.playback_settings();
        commands.spawn((
            AudioPlayer::new(attachment.source.clone()),
            settings,
            emitter,
            ChildOf(parent),
        ));
    } else {
        commands.spawn((emitter, ChildOf(parent)));
    }
}

/// Starts the background music once a queued track has decoded.
///
/// Runs in PostUpdate, after every Update system had its chance to call
/// `set_volume`, so the track starts at the volume of this frame. Every
/// queued start is honoured, even one made before a `stop_background_music`.
pub fn start_loaded_music(
    mut commands: Commands,
    mut pending: ResMut<PendingAudio>,
    sources: Res<Assets<AudioSource>>,
    asset_server: Res<AssetServer>,
    volume: Res<SoundVolume>,
    mut players: Query<(Entity, &mut MusicPlayer)>,
) {
    let queued = std::mem::take(&mut pending.music);

    for track in queued {
        match load_progress(&track, &sources, &asset_server) {
            LoadProgress::Waiting => pending.music.push(track),
            LoadProgress::Failed(err) => warn!("Could not load background music: {}", err),
            LoadProgress::Ready => {
                let Ok((entity, mut player)) = players.single_mut() else {
                    warn!("No music player to start the background music on");
                    continue;
                };
                if player.playing {
                    warn!("Background music is already playing");
                    continue;
                }
                player.playing = true;
                // Bevy starts the actual playback once it sees the AudioPlayer.
                commands.entity(entity).insert((
                    AudioPlayer::new(track),
                    PlaybackSettings::LOOP.with_volume(Volume::Linear(volume.0)),
                ));
            }
        }
    }
}

/// Marks emitters as stopped once the engine has removed their player,
/// which happens when a non-looping sound reaches its end.
pub fn track_finished_playback(
    mut emitters: Query<&mut PositionalAudio, Without<AudioPlayer>>,
    mut players: Query<&mut MusicPlayer, Without<AudioPlayer>>,
) {
    for mut emitter in emitters.iter_mut() {
        if emitter.playing {
            emitter.playing = false;
        }
    }
    for mut player in players.iter_mut() {
        if player.playing {
            player.playing = false;
        }
    }
}

/// Scales every playing emitter by how far it is from the listener.
///
/// Setting the sink volume replaces the one Bevy computed when it created the
/// sink, so the GlobalVolume factor has to be applied again here.
pub fn apply_distance_attenuation(
    listener: Option<Res<SoundListener>>,
    global_volume: Option<Res<GlobalVolume>>,
    spatial_scale: Option<Res<DefaultSpatialScale>>,
    listeners: Query<(&GlobalTransform, &SpatialListener)>,
    mut emitters: Query<(&PositionalAudio, &GlobalTransform, &mut SpatialAudioSink)>,
) {
    let Some(listener) = listener else {
        return;
    };
    let Ok((listener_transform, ears)) = listeners.get(listener.0) else {
        return;
    };
    let global = global_volume.map_or(1.0, |global| global.volume.to_linear());
    let scale = spatial_scale.map_or(Vec3::ONE, |scale| scale.0 .0);

    // The engine measures from each ear, in scaled units.
    let left_ear = listener_transform.transform_point(ears.left_ear_offset) * scale;
    let right_ear = listener_transform.transform_point(ears.right_ear_offset) * scale;
    let listener_position = listener_transform.translation();

    for (emitter, transform, mut sink) in emitters.iter_mut() {
        let position = transform.translation();
        let scaled = position * scale;
        let volume = compensated_volume(
            &emitter.attenuation,
            emitter.volume * global,
            position.distance(listener_position),
            [scaled.distance(left_ear), scaled.distance(right_ear)],
        );
        sink.set_volume(Volume::Linear(volume));
    }
}
