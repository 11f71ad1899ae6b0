use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use crate::audio::SoundEffect;

const CONFIG_FILE: &str = "sound.ron";

/// Where the sound assets live and how loud the game starts.
///
/// Read from `sound.ron` in the working directory first,
/// then from the per-user config directory. Every field is optional in the
/// file: #[serde(default)] fills the gaps from `SoundConfig::default()`.
#[derive(Resource, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SoundConfig {
    pub eat: String,
    pub chicken: String,
    pub jump: String,
    pub music: String,
    /// Linear gain (0..1) used for the music and for `play_sound`.
    pub initial_volume: f32,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            eat: "sounds/soundeffects/eat1.mp3".to_string(),
            chicken: "sounds/soundeffects/chicken.mp3".to_string(),
            jump: "sounds/soundeffects/jump.mp3".to_string(),
            music: "sounds/music/game-music.mp3".to_string(),
            initial_volume: 0.5,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read sound config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse sound config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

impl SoundConfig {
    pub fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(contents)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Asset path of a sound effect, relative to the `assets/` folder.
    pub fn effect_path(&self, effect: SoundEffect) -> &str {
        match effect {
            SoundEffect::Eat => &self.eat,
            SoundEffect::Chicken => &self.chicken,
            SoundEffect::Jump => &self.jump,
        }
    }

    /// First existing config file, local file wins over the user one.
    pub fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        let user = dirs::config_dir()?.join("snackman").join(CONFIG_FILE);
        user.exists().then_some(user)
    }

    /// Reads the config file if there is one. A broken file is logged and
    /// replaced by the defaults rather than stopping the game.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::locate() else {
            info!("No {} found. Using default sound settings.", CONFIG_FILE);
            return Self::default();
        };

        match Self::from_file(&path) {
            Ok(config) => {
                info!("Loaded sound settings from {:?}", path);
                config
            }
            Err(e) => {
                error!("{}. Using defaults.", e);
                Self::default()
            }
        }
    }
}

/// PreStartup system: inserts the SoundConfig resource unless the app
/// already provided one.
pub fn load_sound_config(mut commands: Commands) {
    commands.insert_resource(SoundConfig::load_or_default());
}
