//! Trivia Turbo - a two-player arithmetic racing game
//!
//! Core modules:
//! - `sim`: Cooperative scheduler, scene registry, motion controllers, sessions and the game state machine
//! - `trivia`: Question generation and answer validation
//! - `accounts`: Credential store persisted as JSON
//! - `settings`: Data-driven timings and tuning
//! - `surface`: Rendering/input abstraction the game drives
//! - `persistence`: Atomic file writes shared by accounts and settings

pub mod accounts;
pub mod error;
pub mod persistence;
pub mod settings;
pub mod sim;
pub mod surface;
pub mod trivia;

pub use accounts::AccountStore;
pub use error::{AccountFieldError, GameError};
pub use settings::Settings;
pub use sim::{Game, GamePhase, PlayerSlot};
pub use surface::{Notice, PanelView, RecordingSurface, Screen, Surface};
pub use trivia::{Difficulty, Question};

/// Playfield geometry (road canvas, y grows downward toward the start)
pub mod consts {
    /// Road canvas dimensions
    pub const FIELD_WIDTH: f32 = 400.0;
    pub const FIELD_HEIGHT: f32 = 800.0;

    /// Dashed lane markers
    pub const LINE_COLUMNS: [f32; 3] = [150.0, 200.0, 250.0];
    pub const LINE_FIRST_Y: f32 = 50.0;
    pub const LINE_SPACING: f32 = 100.0;
    /// Lines that leave the bottom re-enter here
    pub const LINE_RESET_Y: f32 = 0.0;

    /// Ambient traffic drives up the road and re-enters below the field
    pub const NPC_BOUND_Y: f32 = -2000.0;
    pub const NPC_RESET_Y: f32 = 900.0;
    pub const NPC_LANES: [f32; 2] = [125.0, 275.0];

    /// Player cars spawn below the field and drive in to the start line
    pub const CAR_SPAWN_Y: f32 = 1000.0;
    pub const CAR_START_Y: f32 = 700.0;
    pub const PLAYER_ONE_X: f32 = 175.0;
    pub const PLAYER_TWO_X: f32 = 225.0;

    /// Checkered finish line: 20 columns x 2 rows of 10px cells, parked above the field
    pub const FINISH_LEFT_X: f32 = 100.0;
    pub const FINISH_COLUMNS: usize = 20;
    pub const FINISH_CELL: f32 = 10.0;
    pub const FINISH_PARKED_Y: f32 = -100.0;

    /// Closing bars at the field edges
    pub const CLOSING_BAR_XS: [f32; 2] = [0.0, FIELD_WIDTH];

    /// Answer keys per player
    pub const PLAYER_ONE_KEYS: [char; 4] = ['q', 'w', 'e', 'r'];
    pub const PLAYER_TWO_KEYS: [char; 4] = ['u', 'i', 'o', 'p'];
}
