//! Rendering and input surface
//!
//! The game never draws. It tells a `Surface` which entities exist and where,
//! which screen is up, what each question panel shows and which keys are live.

use glam::Vec2;

use crate::sim::scene::{EntityId, Role};
use crate::sim::session::PlayerSlot;

/// Top-level screen on the left-hand canvas
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Login,
    DifficultySelect,
    Countdown { seconds: u32 },
    Playing,
    Ended { winner: String, score: u32 },
    Closed,
}

/// Inline message under the login form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Error(String),
    Success(String),
}

/// One player's question panel
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PanelView {
    pub name: String,
    pub score: u32,
    pub question: Option<String>,
    /// "key: value" per answer slot
    pub options: Vec<String>,
    pub visible: bool,
}

/// Target of a bound key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub player: PlayerSlot,
    pub slot: usize,
}

pub trait Surface {
    fn create_entity(&mut self, id: EntityId, role: Role, pos: Vec2);
    fn move_entity(&mut self, id: EntityId, pos: Vec2);
    fn remove_entity(&mut self, id: EntityId);
    fn bind_key(&mut self, key: char, binding: KeyBinding);
    fn unbind_key(&mut self, key: char);
    fn show_screen(&mut self, screen: &Screen);
    fn update_panel(&mut self, player: PlayerSlot, panel: &PanelView);
    fn notify(&mut self, notice: &Notice);
}

/// Every call a `RecordingSurface` received
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCommand {
    Create { id: EntityId, role: Role, pos: Vec2 },
    Move { id: EntityId, pos: Vec2 },
    Remove { id: EntityId },
    Bind { key: char, binding: KeyBinding },
    Unbind { key: char },
    Screen(Screen),
    Panel { player: PlayerSlot, panel: PanelView },
    Notice(Notice),
}

/// Headless surface that records commands, for tests and replays
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub commands: Vec<SurfaceCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Most recent screen shown
    pub fn screen(&self) -> Option<&Screen> {
        self.commands.iter().rev().find_map(|c| match c {
            SurfaceCommand::Screen(screen) => Some(screen),
            _ => None,
        })
    }

    /// Most recent panel for `player`
    pub fn panel(&self, player: PlayerSlot) -> Option<&PanelView> {
        self.commands.iter().rev().find_map(|c| match c {
            SurfaceCommand::Panel { player: p, panel } if *p == player => Some(panel),
            _ => None,
        })
    }

    pub fn notices(&self) -> Vec<&Notice> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                SurfaceCommand::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    /// Keys bound and not since unbound
    pub fn bound_keys(&self) -> Vec<char> {
        let mut keys = Vec::new();
        for command in &self.commands {
            match command {
                SurfaceCommand::Bind { key, .. } if !keys.contains(key) => keys.push(*key),
                SurfaceCommand::Unbind { key } => keys.retain(|k| k != key),
                _ => {}
            }
        }
        keys
    }

    /// Number of move commands for `id`
    pub fn moves_of(&self, id: EntityId) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, SurfaceCommand::Move { id: moved, .. } if *moved == id))
            .count()
    }
}

impl Surface for RecordingSurface {
    fn create_entity(&mut self, id: EntityId, role: Role, pos: Vec2) {
        self.commands.push(SurfaceCommand::Create { id, role, pos });
    }

    fn move_entity(&mut self, id: EntityId, pos: Vec2) {
        self.commands.push(SurfaceCommand::Move { id, pos });
    }

    fn remove_entity(&mut self, id: EntityId) {
        self.commands.push(SurfaceCommand::Remove { id });
    }

    fn bind_key(&mut self, key: char, binding: KeyBinding) {
        self.commands.push(SurfaceCommand::Bind { key, binding });
    }

    fn unbind_key(&mut self, key: char) {
        self.commands.push(SurfaceCommand::Unbind { key });
    }

    fn show_screen(&mut self, screen: &Screen) {
        self.commands.push(SurfaceCommand::Screen(screen.clone()));
    }

    fn update_panel(&mut self, player: PlayerSlot, panel: &PanelView) {
        self.commands.push(SurfaceCommand::Panel {
            player,
            panel: panel.clone(),
        });
    }

    fn notify(&mut self, notice: &Notice) {
        self.commands.push(SurfaceCommand::Notice(notice.clone()));
    }
}
