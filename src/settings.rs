//! Game tuning and file locations
//!
//! Persisted as JSON next to the executable. Missing fields fall back to the
//! defaults below, so older settings files keep loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{CAR_SPAWN_Y, CAR_START_Y};
use crate::error::GameError;
use crate::persistence;

/// Default settings file name
pub const SETTINGS_FILE: &str = "trivia_turbo_settings.json";
/// Default credential file name
pub const ACCOUNTS_FILE: &str = "account_data.json";

/// Game settings/tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Timing ===
    /// Tick interval for road, traffic, finish line and forward car moves (ms)
    pub animation_delay_ms: u64,
    /// Tick interval for a car pushed back by a wrong answer (ms)
    pub car_down_delay_ms: u64,
    /// Seconds shown before play starts
    pub countdown_seconds: u32,

    // === Motion ===
    /// Pixels per tick for road lines, traffic and the finish line
    pub line_step: f32,
    /// Pixels per tick for player car nudges
    pub car_move_step: f32,
    /// Total distance a correct answer moves the car
    pub car_up_total_move: f32,
    /// Total distance a wrong answer moves the car back
    pub car_down_total_move: f32,
    /// Pixels per tick while cars drive in to the start line
    pub intro_step: f32,

    // === Rules ===
    /// Score needed to win
    pub win_score: u32,

    // === Misc ===
    /// Fixed RNG seed for reproducible runs (entropy when absent)
    pub seed: Option<u64>,
    /// Credential store location
    pub accounts_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            animation_delay_ms: 40,
            car_down_delay_ms: 200,
            countdown_seconds: 3,

            line_step: 10.0,
            car_move_step: 5.0,
            car_up_total_move: 50.0,
            car_down_total_move: 50.0,
            intro_step: 10.0,

            win_score: 12,

            seed: None,
            accounts_path: PathBuf::from(ACCOUNTS_FILE),
        }
    }
}

impl Settings {
    /// Steps in a forward car move
    pub fn car_up_steps(&self) -> u32 {
        steps_for(self.car_up_total_move, self.car_move_step)
    }

    /// Steps in a backward car move
    pub fn car_down_steps(&self) -> u32 {
        steps_for(self.car_down_total_move, self.car_move_step)
    }

    /// Steps for a car to drive in from its spawn point to the start line
    pub fn intro_steps(&self) -> u32 {
        steps_for(CAR_SPAWN_Y - CAR_START_Y, self.intro_step)
    }

    /// Load settings from `path`, using defaults when the file is absent or unreadable
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Ignoring malformed settings {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Using default settings");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), GameError> {
        let json = serde_json::to_string_pretty(self)?;
        persistence::write_text_atomic(path, &json)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}

/// Whole steps needed to cover `distance` at `step` per tick
fn steps_for(distance: f32, step: f32) -> u32 {
    if step <= 0.0 {
        return 0;
    }
    (distance / step).floor().max(0.0) as u32
}
