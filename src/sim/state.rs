//! Game state machine
//!
//! `Game` owns everything a round needs: the scheduler, the scene, live motion
//! controllers, both player sessions, settings, accounts and the surface it
//! draws through. External events arrive as method calls. Scheduled work
//! (animation steps, the countdown) runs inside `advance`.

use std::collections::BTreeSet;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::motion::{
    BoundedStep, Controller, ControllerId, Direction, LoopingScroller, Motions,
};
use super::scene::{EntityId, Role, Scene, SceneChange};
use super::scheduler::{Scheduler, TaskHandle, TickReport};
use super::session::{AnswerOutcome, PlayerSession, PlayerSlot};
use super::tick::{self, Job};
use crate::accounts::AccountStore;
use crate::consts::*;
use crate::error::GameError;
use crate::settings::Settings;
use crate::surface::{KeyBinding, Notice, PanelView, Screen, Surface};
use crate::trivia::Difficulty;

/// Which screen the game is on and which inputs it accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    LoggedOut,
    DifficultySelect,
    /// Seconds left before play starts
    Countdown(u32),
    Playing,
    Ended { winner: PlayerSlot },
    Terminated,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::LoggedOut => "logged out",
            GamePhase::DifficultySelect => "selecting difficulty",
            GamePhase::Countdown(_) => "counting down",
            GamePhase::Playing => "playing",
            GamePhase::Ended { .. } => "ended",
            GamePhase::Terminated => "terminated",
        }
    }
}

/// Everything scheduled jobs may touch
pub(super) struct World<S: Surface> {
    pub(super) scene: Scene,
    pub(super) motions: Motions,
    pub(super) sessions: Vec<PlayerSession>,
    /// Cars waiting for their last animator before joining traffic
    pub(super) pending_retags: BTreeSet<EntityId>,
    pub(super) rng: Pcg32,
    pub(super) settings: Settings,
    pub(super) accounts: AccountStore,
    pub(super) surface: S,
    pub(super) phase: GamePhase,
    pub(super) countdown: Option<TaskHandle>,
    pub(super) finish_sweep: Option<ControllerId>,
    pub(super) user: Option<String>,
}

impl<S: Surface> World<S> {
    /// Forward pending scene changes to the surface
    pub(super) fn flush(&mut self) {
        for change in self.scene.drain_changes() {
            match change {
                SceneChange::Created { id, role, pos } => self.surface.create_entity(id, role, pos),
                SceneChange::Moved { id, pos } => self.surface.move_entity(id, pos),
                SceneChange::Removed { id } => self.surface.remove_entity(id),
            }
        }
    }

    pub(super) fn show(&mut self, screen: Screen) {
        self.surface.show_screen(&screen);
    }

    pub(super) fn publish_panels(&mut self, visible: bool) {
        for session in &self.sessions {
            self.surface.update_panel(session.slot, &session.panel(visible));
        }
    }

    pub(super) fn start_motion(
        &mut self,
        sched: &mut Scheduler<Job>,
        controller: Controller,
        interval_ms: u64,
    ) -> Result<ControllerId, GameError> {
        self.motions
            .start(controller, interval_ms, &self.scene, sched, Job::Motion)
    }

    /// Road markers, closing bars, the parked finish line and both loops
    fn build_road(&mut self, sched: &mut Scheduler<Job>) -> Result<(), GameError> {
        for x in LINE_COLUMNS {
            let mut y = LINE_FIRST_Y;
            while y < FIELD_HEIGHT + LINE_FIRST_Y {
                self.scene.spawn(Role::MovingLine, Vec2::new(x, y));
                y += LINE_SPACING;
            }
        }
        for x in CLOSING_BAR_XS {
            self.scene.spawn(Role::ClosingBar, Vec2::new(x, 0.0));
        }
        self.rebuild_finish_line(sched);

        let step = self.settings.line_step;
        let delay = self.settings.animation_delay_ms;
        self.start_motion(sched, Controller::Loop(LoopingScroller::road_lines(step)), delay)?;
        self.start_motion(sched, Controller::Loop(LoopingScroller::traffic(step)), delay)?;
        Ok(())
    }

    /// Drop any finish line (and its sweep) and park a fresh one above the field
    pub(super) fn rebuild_finish_line(&mut self, sched: &mut Scheduler<Job>) -> Vec<EntityId> {
        if let Some(sweep) = self.finish_sweep.take() {
            self.motions.cancel(sweep, sched);
        }
        for id in self.scene.with_role(Role::FinishSegment) {
            self.scene.remove(id);
        }

        let mut cells = Vec::with_capacity(FINISH_COLUMNS * 2);
        for column in 0..FINISH_COLUMNS {
            let x = FINISH_LEFT_X + column as f32 * FINISH_CELL;
            for row in 0..2 {
                let y = FINISH_PARKED_Y + row as f32 * FINISH_CELL;
                cells.push(self.scene.spawn(Role::FinishSegment, Vec2::new(x, y)));
            }
        }
        cells
    }

    /// Start a bounded nudge of the car owned by `sessions[index]`
    fn nudge_car(
        &mut self,
        sched: &mut Scheduler<Job>,
        index: usize,
        direction: Direction,
    ) -> Result<(), GameError> {
        let (steps, delay) = match direction {
            Direction::TowardFinish => (
                self.settings.car_up_steps(),
                self.settings.animation_delay_ms,
            ),
            Direction::TowardStart => (
                self.settings.car_down_steps(),
                self.settings.car_down_delay_ms,
            ),
        };
        let car = self.sessions[index].car;
        let nudge = BoundedStep::new(car, steps, self.settings.car_move_step, direction);
        let id = self.start_motion(sched, Controller::Bounded(nudge), delay)?;
        self.sessions[index].track_animator(id);
        Ok(())
    }
}

pub struct Game<S: Surface> {
    pub(super) scheduler: Scheduler<Job>,
    pub(super) world: World<S>,
}

impl<S: Surface> Game<S> {
    /// Build the road and start the scenery loops. The game opens on the login screen.
    pub fn new(settings: Settings, accounts: AccountStore, surface: S) -> Result<Self, GameError> {
        let rng = match settings.seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_rng(&mut rand::rng()),
        };

        let mut scheduler = Scheduler::new();
        let mut world = World {
            scene: Scene::new(),
            motions: Motions::new(),
            sessions: Vec::with_capacity(PlayerSlot::ALL.len()),
            pending_retags: BTreeSet::new(),
            rng,
            settings,
            accounts,
            surface,
            phase: GamePhase::LoggedOut,
            countdown: None,
            finish_sweep: None,
            user: None,
        };
        world.build_road(&mut scheduler)?;
        world.show(Screen::Login);
        world.flush();
        log::info!("Game ready ({} entities)", world.scene.len());

        Ok(Self { scheduler, world })
    }

    pub fn phase(&self) -> GamePhase {
        self.world.phase
    }

    pub fn scene(&self) -> &Scene {
        &self.world.scene
    }

    pub fn motions(&self) -> &Motions {
        &self.world.motions
    }

    pub fn settings(&self) -> &Settings {
        &self.world.settings
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.world.accounts
    }

    pub fn surface(&self) -> &S {
        &self.world.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.world.surface
    }

    /// Signed-in username
    pub fn user(&self) -> Option<&str> {
        self.world.user.as_deref()
    }

    pub fn session(&self, slot: PlayerSlot) -> Option<&PlayerSession> {
        self.world.sessions.iter().find(|s| s.slot == slot)
    }

    /// Virtual time in milliseconds
    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    /// Live scheduler tasks
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    fn expect_phase(&self, expected: GamePhase, event: &'static str) -> Result<(), GameError> {
        if self.world.phase == expected {
            Ok(())
        } else {
            Err(GameError::InvalidTransition {
                phase: self.world.phase.as_str(),
                event,
            })
        }
    }

    /// Check credentials and move on to difficulty selection
    pub fn login(&mut self, username: &str, password: &str) -> Result<(), GameError> {
        self.expect_phase(GamePhase::LoggedOut, "log in")?;
        if let Err(e) = self.world.accounts.verify(username, password) {
            log::info!("Rejected login for {:?}", username);
            self.world.surface.notify(&Notice::Error(e.to_string()));
            return Err(e);
        }

        log::info!("{} logged in", username);
        self.world.user = Some(username.to_string());
        self.world.phase = GamePhase::DifficultySelect;
        self.world.show(Screen::DifficultySelect);
        Ok(())
    }

    /// Register a new account. Stays on the login screen either way.
    pub fn sign_up(&mut self, username: &str, password: &str) -> Result<(), GameError> {
        self.expect_phase(GamePhase::LoggedOut, "sign up")?;
        match self.world.accounts.create(username, password) {
            Ok(()) => {
                let notice = Notice::Success("Account created successfully!".to_string());
                self.world.surface.notify(&notice);
                Ok(())
            }
            Err(e) => {
                self.world.surface.notify(&Notice::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Spawn both cars, bind keys and start the countdown
    pub fn select_difficulty(&mut self, difficulty: Difficulty) -> Result<(), GameError> {
        self.expect_phase(GamePhase::DifficultySelect, "select a difficulty")?;
        let world = &mut self.world;
        let sched = &mut self.scheduler;

        let intro_steps = world.settings.intro_steps();
        let intro_step = world.settings.intro_step;
        let delay = world.settings.animation_delay_ms;
        let win_score = world.settings.win_score;

        for slot in PlayerSlot::ALL {
            let car = world
                .scene
                .spawn(Role::Car, Vec2::new(slot.spawn_x(), CAR_SPAWN_Y));
            let mut session = PlayerSession::new(slot, car, difficulty, win_score);

            let intro = BoundedStep::new(car, intro_steps, intro_step, Direction::TowardFinish);
            session.track_animator(world.start_motion(sched, Controller::Bounded(intro), delay)?);

            for (index, &key) in session.keys.iter().enumerate() {
                world.surface.bind_key(key, KeyBinding { player: slot, slot: index });
            }
            world.sessions.push(session);
        }
        world.publish_panels(false);

        let seconds = world.settings.countdown_seconds;
        log::info!("Starting a {} round", difficulty.as_str());
        if seconds == 0 {
            world.begin_play();
        } else {
            world.phase = GamePhase::Countdown(seconds);
            world.show(Screen::Countdown { seconds });
            world.countdown = Some(sched.schedule_repeating(1000, Job::Countdown));
        }
        world.flush();
        Ok(())
    }

    /// Route a key press to the session bound to it.
    ///
    /// Keys are ignored outside play and after the round is decided; only
    /// scheduling failures surface as errors.
    pub fn key_press(&mut self, key: char) -> Result<Option<AnswerOutcome>, GameError> {
        if !matches!(
            self.world.phase,
            GamePhase::Playing | GamePhase::Ended { .. }
        ) {
            log::trace!("Ignoring {:?} while {}", key, self.world.phase.as_str());
            return Ok(None);
        }
        let world = &mut self.world;
        let Some((index, slot)) = world
            .sessions
            .iter()
            .enumerate()
            .find_map(|(i, s)| s.slot_for_key(key).map(|slot| (i, slot)))
        else {
            log::trace!("Unbound key {:?}", key);
            return Ok(None);
        };

        let session = &mut world.sessions[index];
        let outcome = match session.submit_answer(slot, &mut world.rng) {
            Ok(outcome) => outcome,
            Err(GameError::StaleInputAfterGameEnd) => {
                log::trace!("Stale key {:?} after the round ended", key);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let player = session.slot;
        log::debug!("{} answered slot {}: {:?}", player.name(), slot, outcome);

        if let Some(direction) = outcome.motion() {
            world.nudge_car(&mut self.scheduler, index, direction)?;
        }
        let panel = world.sessions[index].panel(true);
        world.surface.update_panel(player, &panel);

        if let AnswerOutcome::Won { .. } = outcome {
            world.declare_winner(&mut self.scheduler, player)?;
        }
        world.flush();
        Ok(Some(outcome))
    }

    /// Back to difficulty selection after a finished round
    pub fn replay(&mut self) -> Result<(), GameError> {
        let GamePhase::Ended { .. } = self.world.phase else {
            return Err(GameError::InvalidTransition {
                phase: self.world.phase.as_str(),
                event: "replay",
            });
        };
        let world = &mut self.world;

        for mut session in std::mem::take(&mut world.sessions) {
            for id in session.take_animators() {
                world.motions.cancel(id, &mut self.scheduler);
            }
            for key in session.keys {
                world.surface.unbind_key(key);
            }
            let hidden = PanelView {
                name: session.slot.name().to_string(),
                ..PanelView::default()
            };
            world.surface.update_panel(session.slot, &hidden);
        }
        for car in std::mem::take(&mut world.pending_retags) {
            world.scene.retag(car, Role::Npc);
        }

        log::info!("Replaying");
        world.phase = GamePhase::DifficultySelect;
        world.show(Screen::DifficultySelect);
        world.flush();
        Ok(())
    }

    /// Close the game from any phase, cancelling all scheduled work
    pub fn quit(&mut self) {
        if self.world.phase == GamePhase::Terminated {
            return;
        }
        self.world.motions.cancel_all(&mut self.scheduler);
        self.scheduler.cancel_all();
        self.world.countdown = None;
        self.world.finish_sweep = None;

        log::info!("Quitting from {}", self.world.phase.as_str());
        self.world.phase = GamePhase::Terminated;
        self.world.show(Screen::Closed);
        self.world.flush();
    }

    /// Advance the virtual clock, running every job that comes due
    pub fn advance(&mut self, elapsed_ms: u64) -> TickReport {
        self.scheduler
            .advance(elapsed_ms, &mut self.world, tick::run_job)
    }
}

#[cfg(test)]
impl Game<crate::surface::RecordingSurface> {
    /// Seeded game already past login, difficulty and countdown
    pub(crate) fn playing(seed: u64) -> Self {
        let settings = Settings {
            seed: Some(seed),
            ..Settings::default()
        };
        let surface = crate::surface::RecordingSurface::new();
        let mut game = Game::new(settings, AccountStore::in_memory(), surface).unwrap();
        game.sign_up("tester", "pw").unwrap();
        game.login("tester", "pw").unwrap();
        game.select_difficulty(Difficulty::Easy).unwrap();
        game.advance(3_000);
        assert_eq!(game.phase(), GamePhase::Playing);
        game
    }

    pub(crate) fn correct_key(&self, slot: PlayerSlot) -> char {
        let session = self.session(slot).unwrap();
        session.keys[session.question().unwrap().correct_slot()]
    }

    pub(crate) fn wrong_key(&self, slot: PlayerSlot) -> char {
        let session = self.session(slot).unwrap();
        session.keys[(session.question().unwrap().correct_slot() + 1) % 4]
    }
}
