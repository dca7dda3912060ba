//! Trivia Turbo entry point
//!
//! Line-oriented front end: commands arrive on stdin, the game renders through
//! a terminal surface, and real elapsed time drives the scheduler whether or
//! not anyone is typing.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use glam::Vec2;

use trivia_turbo::settings::SETTINGS_FILE;
use trivia_turbo::sim::{EntityId, Role};
use trivia_turbo::surface::KeyBinding;
use trivia_turbo::{
    AccountStore, Difficulty, Game, GameError, GamePhase, Notice, PanelView, PlayerSlot, Screen,
    Settings, Surface,
};

/// Prints screens, panels and notices; tracks entities for `status`
#[derive(Default)]
struct TerminalSurface {
    entities: BTreeMap<EntityId, (Role, Vec2)>,
}

impl TerminalSurface {
    fn print_cars(&self) {
        for (id, (role, pos)) in &self.entities {
            if *role == Role::Car {
                println!("  car {:>3} at ({:.0}, {:.0})", id.0, pos.x, pos.y);
            }
        }
        let traffic = self
            .entities
            .values()
            .filter(|(role, _)| *role == Role::Npc)
            .count();
        println!("  {} car(s) in traffic", traffic);
    }
}

impl Surface for TerminalSurface {
    fn create_entity(&mut self, id: EntityId, role: Role, pos: Vec2) {
        self.entities.insert(id, (role, pos));
    }

    fn move_entity(&mut self, id: EntityId, pos: Vec2) {
        if let Some(entry) = self.entities.get_mut(&id) {
            entry.1 = pos;
        }
    }

    fn remove_entity(&mut self, id: EntityId) {
        self.entities.remove(&id);
    }

    fn bind_key(&mut self, key: char, binding: KeyBinding) {
        log::debug!("bind {} -> {} slot {}", key, binding.player.name(), binding.slot);
    }

    fn unbind_key(&mut self, key: char) {
        log::debug!("unbind {}", key);
    }

    fn show_screen(&mut self, screen: &Screen) {
        match screen {
            Screen::Login => println!("== Trivia Turbo ==\nlogin <user> <pass> | signup <user> <pass>"),
            Screen::DifficultySelect => println!("Select Difficulty: easy | medium | hard"),
            Screen::Countdown { seconds } => println!("{}...", seconds),
            Screen::Playing => println!("GO!"),
            Screen::Ended { winner, score } => {
                println!("{} Won!\nScore: {}\nPlay Again? replay | quit", winner, score)
            }
            Screen::Closed => println!("Bye."),
        }
    }

    fn update_panel(&mut self, player: PlayerSlot, panel: &PanelView) {
        if !panel.visible {
            return;
        }
        let question = panel.question.as_deref().unwrap_or("");
        println!(
            "[{}] Score: {}  {}  {}",
            player.name(),
            panel.score,
            question,
            panel.options.join("  ")
        );
    }

    fn notify(&mut self, notice: &Notice) {
        match notice {
            Notice::Error(message) => println!("! {}", message),
            Notice::Success(message) => println!("{}", message),
        }
    }
}

/// Apply one input line. Returns false once the game has terminated.
fn handle_line(game: &mut Game<TerminalSurface>, line: &str) -> Result<bool, GameError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(true);
    };

    match command {
        "login" | "signup" => {
            let username = words.next().unwrap_or("");
            let password = words.next().unwrap_or("");
            if command == "login" {
                game.login(username, password)?;
            } else {
                game.sign_up(username, password)?;
            }
        }
        "replay" => game.replay()?,
        "quit" | "exit" => game.quit(),
        "status" => {
            println!("phase: {:?} at {} ms", game.phase(), game.now());
            game.surface().print_cars();
        }
        "wait" => {
            let ms = words.next().and_then(|w| w.parse().ok()).unwrap_or(1_000);
            std::thread::sleep(Duration::from_millis(ms));
        }
        other => {
            if let Some(difficulty) = Difficulty::from_str(other) {
                game.select_difficulty(difficulty)?;
            } else {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(key), None) => {
                        game.key_press(key)?;
                    }
                    _ => println!("? unknown command {:?}", other),
                }
            }
        }
    }
    Ok(game.phase() != GamePhase::Terminated)
}

/// Advance the game by the real time since `last`
fn catch_up(game: &mut Game<TerminalSurface>, last: &mut Instant) {
    let now = Instant::now();
    let report = game.advance(now.duration_since(*last).as_millis() as u64);
    *last = now;
    for fault in report.faults {
        log::warn!("{}", GameError::from(fault));
    }
}

/// Forward stdin lines over a channel so the game keeps ticking between them
fn spawn_input() -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn run() -> Result<(), GameError> {
    let settings_path = Path::new(SETTINGS_FILE);
    let settings = Settings::load(settings_path);
    if !settings_path.exists() {
        if let Err(e) = settings.save(settings_path) {
            log::warn!("Could not write default settings: {}", e);
        }
    }
    let poll = Duration::from_millis(settings.animation_delay_ms.max(1));
    let accounts = AccountStore::load(settings.accounts_path.clone())?;
    let mut game = Game::new(settings, accounts, TerminalSurface::default())?;

    let input = spawn_input();
    let mut last = Instant::now();
    loop {
        let line = match input.recv_timeout(poll) {
            Ok(line) => Some(line?),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        catch_up(&mut game, &mut last);
        if let Some(line) = line {
            match handle_line(&mut game, &line) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => log::info!("{}", e),
            }
            catch_up(&mut game, &mut last);
        }
        io::stdout().flush()?;
    }

    game.quit();
    Ok(())
}

fn main() {
    env_logger::init();
    log::info!("Trivia Turbo starting...");

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
