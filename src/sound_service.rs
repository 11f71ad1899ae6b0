// sound_service.rs - The public face of the audio module
//
// SoundService bundles every resource and query needed to attach, play and
// stop sounds into one SystemParam, so a gameplay system only asks for
// `mut sounds: SoundService` instead of a dozen parameters.
//
// Nothing here talks to the audio device directly. The service only inserts
// or removes AudioPlayer components, and Bevy's own audio systems turn those
// into actual playback during PostUpdate. Call it from Update; a PostUpdate
// caller has to be ordered `.before(SoundSystems::Playback)`.

use bevy::{
    audio::{AudioSinkPlayback, GlobalVolume, Volume},
    ecs::system::SystemParam,
    prelude::*,
};

use crate::audio::{
    AttachTarget, MusicPlayer, PendingAttachment, PendingAudio, PositionalAudio, SoundEffect,
    SoundGroup, SoundLibrary, SoundListener, SoundParameters, SoundVolume,
};

#[derive(SystemParam)]
pub struct SoundService<'w, 's> {
    commands: Commands<'w, 's>,
    library: Res<'w, SoundLibrary>,
    listener: Res<'w, SoundListener>,
    global_volume: Option<Res<'w, GlobalVolume>>,
    volume: ResMut<'w, SoundVolume>,
    pending: ResMut<'w, PendingAudio>,
    groups: Query<'w, 's, (), With<SoundGroup>>,
    children: Query<'w, 's, &'static Children>,
    emitters: Query<'w, 's, (&'static mut PositionalAudio, Option<&'static SpatialAudioSink>)>,
    music: Query<
        'w,
        's,
        (
            Entity,
            &'static mut MusicPlayer,
            Option<&'static mut AudioSink>,
            Option<&'static mut PlaybackSettings>,
        ),
    >,
}

impl SoundService<'_, '_> {
    /// Attaches one emitter to every child of `group` once the sound has
    /// been decoded. The children are looked up at that moment, not now.
    pub fn add_positional_audio(
        &mut self,
        effect: SoundEffect,
        group: Entity,
        params: SoundParameters,
    ) {
        self.queue_attachment(effect, AttachTarget::EachChildOf(group), params);
    }

    /// Attaches a single emitter to `node` itself, even if it is a group.
    pub fn add_single_audio(
        &mut self,
        effect: SoundEffect,
        node: Entity,
        params: SoundParameters,
    ) {
        self.queue_attachment(effect, AttachTarget::Node(node), params);
    }

    fn queue_attachment(
        &mut self,
        effect: SoundEffect,
        target: AttachTarget,
        params: SoundParameters,
    ) {
        // The only failure we know about: the library has no file for this
        // effect. Log it and leave the scene alone.
        let Some(source) = self.library.get(effect) else {
            error!("Sound not found: {:?}", effect);
            return;
        };

        self.pending.attachments.push(PendingAttachment {
            effect,
            source: source.clone(),
            target,
            params,
        });
    }

    /// Plays the first emitter on `node` at the current global volume.
    /// Does nothing if there is no emitter or it is already playing.
    ///
    /// From a PostUpdate system, order it `.before(SoundSystems::Playback)`.
    pub fn play_sound(&mut self, node: Entity) {
        let Some(entity) = self.first_emitter(node) else {
            return;
        };
        let volume = self.volume.0;
        let Ok((mut emitter, _)) = self.emitters.get_mut(entity) else {
            return;
        };
        if emitter.playing {
            return;
        }

        emitter.volume = volume;
        emitter.playing = true;
        // A finished AudioPlayer can't be restarted, so every play gets a
        // fresh one. Bevy creates the sink for it later this frame.
        let player = AudioPlayer::new(emitter.source.clone());
        let settings = emitter.playback_settings();
        self.commands.entity(entity).insert((player, settings));
    }

    /// For a group, stops the first emitter of each child. For anything else,
    /// stops the first emitter directly on `node`.
    pub fn stop_sound(&mut self, node: Entity) {
        if self.groups.contains(node) {
            let members: Vec<Entity> = self
                .children
                .get(node)
                .map(|children| children.iter().collect())
                .unwrap_or_default();
            for member in members {
                self.stop_first_emitter(member);
            }
        } else {
            self.stop_first_emitter(node);
        }
    }

    fn stop_first_emitter(&mut self, node: Entity) {
        let Some(entity) = self.first_emitter(node) else {
            return;
        };
        let Ok((mut emitter, sink)) = self.emitters.get_mut(entity) else {
            return;
        };

        // Stop the sound now; removing the player only takes effect once the
        // commands are applied.
        if let Some(sink) = sink {
            sink.stop();
        }
        emitter.playing = false;
        self.commands
            .entity(entity)
            .remove::<(AudioPlayer, PlaybackSettings, SpatialAudioSink)>();
    }

    /// True if the first emitter on `node` is currently playing.
    pub fn is_playing(&self, node: Entity) -> bool {
        self.first_emitter(node)
            .and_then(|entity| self.emitters.get(entity).ok())
            .is_some_and(|(emitter, _)| emitter.playing)
    }

    fn first_emitter(&self, node: Entity) -> Option<Entity> {
        self.children
            .get(node)
            .ok()?
            .iter()
            .find(|child| self.emitters.contains(*child))
    }

    /// Queues the music track. It starts looping at the global volume once
    /// decoded, even if `stop_background_music` is called in between.
    pub fn start_background_music(&mut self) {
        let track = self.library.music().clone();
        self.pending.music.push(track);
    }

    pub fn is_music_playing(&self) -> bool {
        self.music
            .single()
            .is_ok_and(|(_, player, _, _)| player.is_playing())
    }

    pub fn stop_background_music(&mut self) {
        let Ok((entity, mut player, sink, _)) = self.music.single_mut() else {
            return;
        };

        if let Some(sink) = sink {
            sink.stop();
        }
        player.playing = false;
        self.commands
            .entity(entity)
            .remove::<(AudioPlayer, PlaybackSettings, AudioSink)>();
    }

    /// Changes the music volume right away and the volume of every later
    /// `play_sound`. Emitters that are already playing keep their volume.
    pub fn set_volume(&mut self, level: f32) {
        self.volume.0 = level;
        let Ok((_, _, sink, settings)) = self.music.single_mut() else {
            return;
        };
        // Right after the music starts, Bevy may not have built the sink yet.
        // It reads the volume from PlaybackSettings when it does.
        if let Some(mut settings) = settings {
            settings.volume = Volume::Linear(level);
        }
        if let Some(mut sink) = sink {
            // Bevy built the sink with the global volume mixed in; keep it.
            let global = self
                .global_volume
                .as_ref()
                .map_or(1.0, |global| global.volume.to_linear());
            sink.set_volume(Volume::Linear(level * global));
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume.0
    }

    pub fn listener(&self) -> Entity {
        self.listener.0
    }

    /// Makes the listener follow `parent`, usually the camera or the player.
    pub fn attach_listener_to(&mut self, parent: Entity) {
        self.commands.entity(self.listener.0).insert(ChildOf(parent));
    }
}

/// Fire-and-forget sound commands for code that would rather trigger an
/// event than hold a SoundService, e.g. `commands.trigger(SoundRequest::Play { node })`.
#[derive(Event, Debug, Clone, Copy)]
pub enum SoundRequest {
    AddPositional {
        effect: SoundEffect,
        group: Entity,
        params: SoundParameters,
    },
    AddSingle {
        effect: SoundEffect,
        node: Entity,
        params: SoundParameters,
    },
    Play {
        node: Entity,
    },
    Stop {
        node: Entity,
    },
    StartMusic,
    StopMusic,
    SetVolume(f32),
}

pub fn on_sound_request(request: On<SoundRequest>, mut sounds: SoundService) {
    match *request {
        SoundRequest::AddPositional {
            effect,
            group,
            params,
        } => sounds.add_positional_audio(effect, group, params),
        SoundRequest::AddSingle {
            effect,
            node,
            params,
        } => sounds.add_single_audio(effect, node, params),
        SoundRequest::Play { node } => sounds.play_sound(node),
        SoundRequest::Stop { node } => sounds.stop_sound(node),
        SoundRequest::StartMusic => sounds.start_background_music(),
        SoundRequest::StopMusic => sounds.stop_background_music(),
        SoundRequest::SetVolume(level) => sounds.set_volume(level),
    }
}
