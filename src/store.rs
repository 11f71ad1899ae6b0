// store.rs - Global game state (singleton data)
// Resources exist once for the entire game, unlike components which are per-entity.

use bevy::prelude::*;

pub struct GameStorePlugin;

impl Plugin for GameStorePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GameStore>()
            .add_observer(on_game_state_update);
    }
}

/// Countdown and calorie counter shown by the HUD.
///
/// The two values are unrelated and only change through the setters. There
/// is no reset: a new round sets both explicitly.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GameStore {
    remaining_time: i32,
    calories: i32,
}

impl GameStore {
    /// Seconds left in the round.
    pub fn remaining_time(&self) -> i32 {
        self.remaining_time
    }

    pub fn calories(&self) -> i32 {
        self.calories
    }

    pub fn set_remaining_time(&mut self, time: i32) {
        self.remaining_time = time;
    }

    pub fn set_calories(&mut self, amount: i32) {
        self.calories = amount;
        debug!("calories: {}", self.calories);
    }
}

/// Authoritative values pushed by the server. Fields left as None keep
/// their current value.
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct GameStateUpdate {
    pub remaining_time: Option<i32>,
    pub calories: Option<i32>,
}

pub fn on_game_state_update(update: On<GameStateUpdate>, mut store: ResMut<GameStore>) {
    if let Some(time) = update.remaining_time {
        store.set_remaining_time(time);
    }
    if let Some(amount) = update.calories {
        store.set_calories(amount);
    }
}
