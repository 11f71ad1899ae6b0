// lib.rs - Public API for the snackman audio crate
// Re-exports the plugins and the types gameplay code works with, so main.rs stays clean

pub mod attenuation;
pub mod audio;
pub mod config;
pub mod sound_service;
pub mod store;

pub use attenuation::Attenuation;
pub use audio::{
    MusicPlayer, PositionalAudio, SoundEffect, SoundGroup, SoundLibrary, SoundListener,
    SoundParameters, SoundPlugin, SoundSystems, SoundVolume,
};
pub use config::{ConfigError, SoundConfig};
pub use sound_service::{SoundRequest, SoundService};
pub use store::{GameStateUpdate, GameStore, GameStorePlugin};
